//! Notification sink types for subwatch.

use chrono::{DateTime, Utc};

/// Identifier of a destination channel.
pub type ChannelId = u64;

/// A named, channel-scoped delivery handle.
///
/// Replaced wholesale on self-heal, never mutated in place, so readers see
/// either the old or the new handle.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    /// Endpoint name, derived deterministically from the feed identity.
    pub name: String,
    /// Delivery URL.
    pub url: String,
}

impl Endpoint {
    /// Create an endpoint handle.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Author block of a notification message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageAuthor {
    /// Display name, e.g. `r/rust`.
    pub name: String,
    /// Link back to the source.
    pub url: String,
    /// Icon shown next to the name.
    pub icon_url: Option<String>,
}

/// Rich notification payload for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Item title.
    pub title: String,
    /// Canonical URL of the item.
    pub url: String,
    /// Creation timestamp of the item.
    pub timestamp: DateTime<Utc>,
    /// Source attribution block.
    pub author: MessageAuthor,
    /// Preview image, when the linked resource is an image.
    pub image_url: Option<String>,
    /// Truncated body text, when the item has one.
    pub body: Option<String>,
    /// Footer line naming the item author, e.g. `u/someone`.
    pub footer: String,
}
