//! Notification dispatch for subwatch.
//!
//! The dispatcher formats an item into a message and delivers it through
//! the feed's endpoint, re-creating the endpoint once when it disappeared.
//! A channel that no longer exists, or a sink that refuses endpoint
//! creation, stops the feed permanently.

use std::sync::Arc;

use tracing::{info, warn};
use url::Url;

use crate::monitor::feed::Feed;
use crate::sink::types::{Endpoint, Message, MessageAuthor};
use crate::sink::NotificationSink;
use crate::source::types::{Item, SourceInfo};
use crate::{Result, SubwatchError};

/// Hard cap on delivered body text, in characters.
pub const MAX_BODY_LENGTH: usize = 2040;

/// Marker appended when body text was truncated.
pub const TRUNCATION_MARKER: &str = "...";

/// File extensions delivered as an inline image preview.
pub const IMAGE_EXTENSIONS: &[&str] =
    &[".jpg", ".png", ".jpeg", ".webp", ".webm", ".gif", ".gifv"];

/// Result of one dispatch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The message was delivered.
    Delivered,
    /// Delivery failed and the failure was swallowed. The feed stays up.
    Dropped,
    /// The feed was stopped permanently; nothing was or will be delivered.
    FeedStopped,
}

/// Formats items and delivers them through the feed's endpoint.
pub struct Dispatcher {
    sink: Arc<dyn NotificationSink>,
    link_base: String,
}

impl Dispatcher {
    /// Create a dispatcher delivering through the given sink.
    ///
    /// `link_base` is the site prefix canonical item URLs are built from.
    pub fn new(sink: Arc<dyn NotificationSink>, link_base: impl Into<String>) -> Self {
        Self {
            sink,
            link_base: link_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Format and deliver one item for one feed.
    ///
    /// Delivery is attempted at most twice: the original attempt plus one
    /// retry after endpoint re-creation. Errors that are terminal for the
    /// feed stop it here; any other delivery failure is logged and
    /// swallowed so a single missed notification cannot take the feed
    /// down.
    pub async fn dispatch(&self, feed: &Arc<Feed>, item: &Item) -> Result<DispatchOutcome> {
        if feed.is_stopped() {
            return Ok(DispatchOutcome::FeedStopped);
        }

        let info = feed.info().await.unwrap_or_default();
        let message = self.build_message(&info, item);
        info!(
            "dispatching item {} from r/{}",
            item.id,
            feed.source_id()
        );

        let mut healed = false;
        loop {
            let endpoint = match self.resolve_endpoint(feed, &info).await? {
                Some(endpoint) => endpoint,
                None => return Ok(DispatchOutcome::FeedStopped),
            };

            match self.sink.send(&endpoint, &message).await {
                Ok(()) => return Ok(DispatchOutcome::Delivered),
                Err(SubwatchError::EndpointGone) if !healed => {
                    healed = true;
                    warn!(
                        "endpoint for r/{} is gone, re-resolving",
                        feed.source_id()
                    );
                    feed.clear_endpoint().await;
                }
                Err(e) => {
                    warn!("failed to deliver item {}: {}", item.id, e);
                    return Ok(DispatchOutcome::Dropped);
                }
            }
        }
    }

    /// Return the feed's endpoint, resolving or re-creating it when there
    /// is no cached handle. Returns `None` after stopping the feed on a
    /// gone channel or missing privilege.
    async fn resolve_endpoint(
        &self,
        feed: &Arc<Feed>,
        info: &SourceInfo,
    ) -> Result<Option<Endpoint>> {
        if let Some(endpoint) = feed.endpoint().await {
            return Ok(Some(endpoint));
        }

        let name = feed.endpoint_name();
        let found = match self.sink.find_endpoint(feed.channel_id(), &name).await {
            Ok(found) => found,
            Err(SubwatchError::ChannelGone) => {
                warn!(
                    "channel {} is gone, stopping feed r/{}",
                    feed.channel_id(),
                    feed.source_id()
                );
                feed.stop().await;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let endpoint = match found {
            Some(endpoint) => endpoint,
            None => {
                let icon = resolve_icon(info);
                match self
                    .sink
                    .create_endpoint(feed.channel_id(), &name, icon.as_deref())
                    .await
                {
                    Ok(endpoint) => endpoint,
                    Err(SubwatchError::ChannelGone) => {
                        warn!(
                            "channel {} is gone, stopping feed r/{}",
                            feed.channel_id(),
                            feed.source_id()
                        );
                        feed.stop().await;
                        return Ok(None);
                    }
                    Err(SubwatchError::Forbidden(reason)) => {
                        warn!(
                            "cannot create endpoint for r/{} ({}), stopping feed",
                            feed.source_id(),
                            reason
                        );
                        feed.stop().await;
                        return Ok(None);
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        feed.set_endpoint(endpoint.clone()).await;
        Ok(Some(endpoint))
    }

    /// Build the notification payload for an item.
    fn build_message(&self, info: &SourceInfo, item: &Item) -> Message {
        Message {
            title: item.title.clone(),
            url: format!("{}{}", self.link_base, item.permalink),
            timestamp: item.created_at,
            author: MessageAuthor {
                name: format!("r/{}", info.display_name),
                url: format!("{}/r/{}", self.link_base, info.display_name),
                icon_url: resolve_icon(info),
            },
            image_url: image_preview(&item.url),
            body: item.body.as_deref().map(truncate_body),
            footer: format!("u/{}", item.author),
        }
    }
}

/// Pick the feed's icon: the source's own icon when set, otherwise the
/// community icon with query and fragment stripped.
fn resolve_icon(info: &SourceInfo) -> Option<String> {
    if let Some(icon) = &info.icon_url {
        return Some(icon.clone());
    }
    info.community_icon_url
        .as_deref()
        .and_then(strip_query_and_fragment)
}

/// Reduce a URL to scheme, host, and path.
fn strip_query_and_fragment(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}

/// Return the URL as an image preview when it points at a recognized
/// image file.
fn image_preview(url: &str) -> Option<String> {
    let lower = url.to_lowercase();
    if IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        Some(url.to_string())
    } else {
        None
    }
}

/// Cap body text at [`MAX_BODY_LENGTH`] characters, appending the marker
/// only when something was cut.
fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_BODY_LENGTH {
        body.to_string()
    } else {
        let mut truncated: String = body.chars().take(MAX_BODY_LENGTH).collect();
        truncated.push_str(TRUNCATION_MARKER);
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body_short_is_unchanged() {
        let body = "a".repeat(100);
        assert_eq!(truncate_body(&body), body);
    }

    #[test]
    fn test_truncate_body_exact_is_unchanged() {
        let body = "a".repeat(MAX_BODY_LENGTH);
        assert_eq!(truncate_body(&body), body);
    }

    #[test]
    fn test_truncate_body_long_gets_marker() {
        let body = "a".repeat(3000);
        let truncated = truncate_body(&body);
        assert_eq!(
            truncated.chars().count(),
            MAX_BODY_LENGTH + TRUNCATION_MARKER.len()
        );
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert_eq!(&truncated[..MAX_BODY_LENGTH], "a".repeat(MAX_BODY_LENGTH));
    }

    #[test]
    fn test_image_preview_allowlist() {
        assert!(image_preview("https://e.com/pic.png").is_some());
        assert!(image_preview("https://e.com/pic.JPG").is_some());
        assert!(image_preview("https://e.com/clip.gifv").is_some());
        assert!(image_preview("https://e.com/page.html").is_none());
        assert!(image_preview("https://e.com/").is_none());
    }

    #[test]
    fn test_strip_query_and_fragment() {
        let stripped =
            strip_query_and_fragment("https://img.example/icon.png?width=256&s=abc#frag").unwrap();
        assert_eq!(stripped, "https://img.example/icon.png");
    }

    #[test]
    fn test_resolve_icon_prefers_own_icon() {
        let info = SourceInfo::new("rust")
            .with_icon_url("https://img.example/own.png")
            .with_community_icon_url("https://img.example/community.png?width=256");
        assert_eq!(
            resolve_icon(&info).as_deref(),
            Some("https://img.example/own.png")
        );
    }

    #[test]
    fn test_resolve_icon_falls_back_to_community() {
        let info =
            SourceInfo::new("rust").with_community_icon_url("https://img.example/c.png?w=64");
        assert_eq!(
            resolve_icon(&info).as_deref(),
            Some("https://img.example/c.png")
        );
    }

    #[test]
    fn test_resolve_icon_none() {
        assert!(resolve_icon(&SourceInfo::new("rust")).is_none());
    }
}
