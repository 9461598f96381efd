//! Item source module for subwatch.
//!
//! The item source is the opaque upstream the monitor consumes: a live
//! stream of new items per feed plus point lookups of single items with
//! their current score.

pub mod http;
pub mod types;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::Result;

pub use http::HttpItemSource;
pub use types::{Item, SourceInfo};

/// A live stream of newly observed items for one feed.
///
/// Infinite in the happy case; an `Err` element means the stream died and
/// the consuming loop terminates permanently.
pub type ItemStream = BoxStream<'static, Result<Item>>;

/// External content source consumed by the monitor.
///
/// Transient errors propagate to the caller; no retry happens inside this
/// interface. Retry is the watch task's responsibility.
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Check that a source exists. Used by the subscription path before a
    /// feed is constructed.
    async fn probe(&self, source_id: &str) -> Result<bool>;

    /// Load display metadata for a source.
    async fn load(&self, source_id: &str) -> Result<SourceInfo>;

    /// Fetch a single item by id with its current score.
    async fn fetch_item(&self, item_id: &str) -> Result<Item>;

    /// Subscribe to the live stream of new items for a source.
    ///
    /// Items that existed before subscription are skipped. Restartable by
    /// calling again.
    fn subscribe(&self, source_id: &str) -> ItemStream;
}
