//! Item source types for subwatch.

use chrono::{DateTime, Utc};

/// A single piece of content emitted by a source.
///
/// Validated at the source boundary; the core never inspects untyped
/// payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Item id, unique within the source.
    pub id: String,
    /// Item title.
    pub title: String,
    /// URL of the linked resource (may be the item itself for text posts).
    pub url: String,
    /// Author name.
    pub author: String,
    /// When the item was created.
    pub created_at: DateTime<Utc>,
    /// Current score.
    pub score: i64,
    /// Body text for self posts, if any.
    pub body: Option<String>,
    /// Site-relative path to the item's canonical page.
    pub permalink: String,
}

/// Display metadata for a source, cached per feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceInfo {
    /// Display name of the source.
    pub display_name: String,
    /// The source's own icon URL, if set.
    pub icon_url: Option<String>,
    /// The community-level icon URL, if set. May carry query parameters.
    pub community_icon_url: Option<String>,
}

impl SourceInfo {
    /// Create metadata with just a display name.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            icon_url: None,
            community_icon_url: None,
        }
    }

    /// Set the source's own icon URL.
    pub fn with_icon_url(mut self, url: impl Into<String>) -> Self {
        self.icon_url = Some(url.into());
        self
    }

    /// Set the community-level icon URL.
    pub fn with_community_icon_url(mut self, url: impl Into<String>) -> Self {
        self.community_icon_url = Some(url.into());
        self
    }
}
