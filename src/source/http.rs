//! HTTP item source.
//!
//! This module implements [`ItemSource`](crate::source::ItemSource) against
//! a Reddit-style JSON API: listing endpoints for the live stream and the
//! existence probe, an about endpoint for display metadata, and an info
//! endpoint for point lookups.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream;
use reqwest::Client;
use serde::Deserialize;

use crate::config::SourceConfig;
use crate::source::types::{Item, SourceInfo};
use crate::source::{ItemSource, ItemStream};
use crate::{Result, SubwatchError};

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Total request timeout in seconds.
const TOTAL_TIMEOUT_SECS: u64 = 30;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Reddit-style JSON API client.
pub struct HttpItemSource {
    client: Client,
    api_base: String,
    stream_poll_interval: Duration,
}

impl HttpItemSource {
    /// Create a new source client from configuration.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(TOTAL_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| SubwatchError::Source(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            stream_poll_interval: Duration::from_secs(config.stream_poll_interval_secs),
        })
    }
}

#[async_trait]
impl ItemSource for HttpItemSource {
    async fn probe(&self, source_id: &str) -> Result<bool> {
        let url = format!("{}/r/{}.json", self.api_base, source_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SubwatchError::Source(format!("probe failed: {e}")))?;
        Ok(response.status().is_success())
    }

    async fn load(&self, source_id: &str) -> Result<SourceInfo> {
        let url = format!("{}/r/{}/about.json", self.api_base, source_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SubwatchError::Source(format!("failed to load source: {e}")))?;

        if !response.status().is_success() {
            return Err(SubwatchError::Source(format!(
                "HTTP error loading {source_id}: {}",
                response.status()
            )));
        }

        let about: AboutResponse = response
            .json()
            .await
            .map_err(|e| SubwatchError::Source(format!("invalid about payload: {e}")))?;

        Ok(about.data.into_info())
    }

    async fn fetch_item(&self, item_id: &str) -> Result<Item> {
        let url = format!("{}/api/info.json?id=t3_{}", self.api_base, item_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SubwatchError::ItemFetch(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(SubwatchError::ItemFetch(format!(
                "HTTP error fetching {item_id}: {}",
                response.status()
            )));
        }

        let listing: Listing = response
            .json()
            .await
            .map_err(|e| SubwatchError::ItemFetch(format!("invalid item payload: {e}")))?;

        listing
            .data
            .children
            .into_iter()
            .next()
            .map(|thing| thing.data.into_item())
            .ok_or_else(|| SubwatchError::NotFound(format!("item {item_id}")))
    }

    fn subscribe(&self, source_id: &str) -> ItemStream {
        let state = StreamState {
            client: self.client.clone(),
            url: format!("{}/r/{}/new.json", self.api_base, source_id),
            interval: self.stream_poll_interval,
            seen: HashSet::new(),
            pending: VecDeque::new(),
            primed: false,
        };

        Box::pin(stream::unfold(state, |mut st| async move {
            loop {
                if let Some(item) = st.pending.pop_front() {
                    return Some((Ok(item), st));
                }

                if st.primed {
                    tokio::time::sleep(st.interval).await;
                }

                match fetch_listing(&st.client, &st.url).await {
                    Ok(items) => {
                        if !st.primed {
                            // First page is consumed silently so items that
                            // existed before subscription are skipped.
                            st.primed = true;
                            st.seen = items.into_iter().map(|i| i.id).collect();
                            continue;
                        }

                        // The listing is newest-first; emit in emission order.
                        let mut current = HashSet::with_capacity(st.seen.len());
                        for item in items.into_iter().rev() {
                            current.insert(item.id.clone());
                            if !st.seen.contains(&item.id) {
                                st.pending.push_back(item);
                            }
                        }
                        // Ids that fell out of the listing window cannot come
                        // back as new, so the seen set tracks the window only.
                        st.seen = current;
                    }
                    Err(e) => return Some((Err(e), st)),
                }
            }
        }))
    }
}

/// State carried between polls of a subscribed listing.
struct StreamState {
    client: Client,
    url: String,
    interval: Duration,
    seen: HashSet<String>,
    pending: VecDeque<Item>,
    primed: bool,
}

/// Fetch one page of a listing endpoint.
async fn fetch_listing(client: &Client, url: &str) -> Result<Vec<Item>> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| SubwatchError::Source(format!("listing request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(SubwatchError::Source(format!(
            "HTTP error: {}",
            response.status()
        )));
    }

    let listing: Listing = response
        .json()
        .await
        .map_err(|e| SubwatchError::Source(format!("invalid listing payload: {e}")))?;

    Ok(listing
        .data
        .children
        .into_iter()
        .map(|thing| thing.data.into_item())
        .collect())
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    data: ItemData,
}

/// Wire form of an item. Converted to [`Item`] at the boundary.
#[derive(Debug, Deserialize)]
struct ItemData {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    created_utc: f64,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    permalink: String,
}

impl ItemData {
    fn into_item(self) -> Item {
        let created_at =
            DateTime::<Utc>::from_timestamp(self.created_utc as i64, 0).unwrap_or_default();
        let body = if self.selftext.is_empty() {
            None
        } else {
            Some(self.selftext)
        };
        Item {
            id: self.id,
            title: self.title,
            url: self.url,
            author: self.author,
            created_at,
            score: self.score,
            body,
            permalink: self.permalink,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AboutResponse {
    data: AboutData,
}

#[derive(Debug, Deserialize)]
struct AboutData {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    icon_img: String,
    #[serde(default)]
    community_icon: String,
}

impl AboutData {
    fn into_info(self) -> SourceInfo {
        let mut info = SourceInfo::new(self.display_name);
        if !self.icon_img.is_empty() {
            info = info.with_icon_url(self.icon_img);
        }
        if !self.community_icon.is_empty() {
            info = info.with_community_icon_url(self.community_icon);
        }
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_data_into_item() {
        let data = ItemData {
            id: "abc123".to_string(),
            title: "A post".to_string(),
            url: "https://example.com/pic.png".to_string(),
            author: "someone".to_string(),
            created_utc: 1_700_000_000.0,
            score: 42,
            selftext: String::new(),
            permalink: "/r/rust/comments/abc123/a_post/".to_string(),
        };
        let item = data.into_item();
        assert_eq!(item.id, "abc123");
        assert_eq!(item.score, 42);
        assert!(item.body.is_none());
        assert_eq!(item.created_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_item_data_keeps_body() {
        let data = ItemData {
            id: "x".to_string(),
            title: String::new(),
            url: String::new(),
            author: String::new(),
            created_utc: 0.0,
            score: 0,
            selftext: "hello".to_string(),
            permalink: String::new(),
        };
        assert_eq!(data.into_item().body.as_deref(), Some("hello"));
    }

    #[test]
    fn test_about_data_empty_icons() {
        let data = AboutData {
            display_name: "rust".to_string(),
            icon_img: String::new(),
            community_icon: String::new(),
        };
        let info = data.into_info();
        assert_eq!(info.display_name, "rust");
        assert!(info.icon_url.is_none());
        assert!(info.community_icon_url.is_none());
    }

    #[test]
    fn test_parse_listing_payload() {
        let json = r#"{
            "data": {
                "children": [
                    {"data": {"id": "p1", "title": "First", "url": "https://e.com/1",
                              "author": "a", "created_utc": 1.0, "score": 3,
                              "selftext": "", "permalink": "/r/t/comments/p1/first/"}}
                ]
            }
        }"#;
        let listing: Listing = serde_json::from_str(json).unwrap();
        assert_eq!(listing.data.children.len(), 1);
        assert_eq!(listing.data.children[0].data.id, "p1");
    }

    #[test]
    fn test_new_source_client() {
        let source = HttpItemSource::new(&SourceConfig::default()).unwrap();
        assert_eq!(source.api_base, "https://reddit.com");
        assert_eq!(source.stream_poll_interval, Duration::from_secs(30));
    }
}
