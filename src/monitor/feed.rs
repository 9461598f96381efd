//! Per-feed shared state for subwatch.
//!
//! A [`Feed`] is one monitored subscription to a source, scoped to one
//! destination channel. It owns the watch-entry map, the cached endpoint
//! handle, and the stop flag that makes feed teardown deterministic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::config::WatchConfig;
use crate::sink::types::{ChannelId, Endpoint};
use crate::source::types::SourceInfo;

/// Watch settings, fixed per feed instance.
#[derive(Debug, Clone, Copy)]
pub struct WatchSettings {
    /// Time between score polls of a watched item.
    pub poll_interval: Duration,
    /// Number of score polls before a watch gives up.
    pub max_attempts: u32,
    /// Pause between consecutive newly observed items.
    pub pacing_delay: Duration,
}

impl From<&WatchConfig> for WatchSettings {
    fn from(config: &WatchConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            max_attempts: config.max_attempts,
            pacing_delay: Duration::from_secs(config.pacing_delay_secs),
        }
    }
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self::from(&WatchConfig::default())
    }
}

/// One monitored feed.
///
/// Mutated only by its owning monitor and the watch tasks it spawned. The
/// endpoint handle is replaced wholesale on self-heal, never mutated in
/// place.
pub struct Feed {
    source_id: String,
    channel_id: ChannelId,
    threshold: u32,
    settings: WatchSettings,
    info: RwLock<Option<SourceInfo>>,
    endpoint: RwLock<Option<Endpoint>>,
    /// In-flight watches by item id. At most one entry per item id.
    watches: Mutex<HashMap<String, JoinHandle<()>>>,
    stopped: AtomicBool,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Feed {
    /// Create a new feed.
    pub fn new(
        source_id: impl Into<String>,
        channel_id: ChannelId,
        threshold: u32,
        settings: WatchSettings,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            channel_id,
            threshold,
            settings,
            info: RwLock::new(None),
            endpoint: RwLock::new(None),
            watches: Mutex::new(HashMap::new()),
            stopped: AtomicBool::new(false),
            loop_handle: Mutex::new(None),
        }
    }

    /// Seed the cached endpoint handle, e.g. from a persisted snapshot.
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = RwLock::new(Some(endpoint));
        self
    }

    /// Source identifier.
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Destination channel.
    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    /// Popularity threshold. 0 means dispatch immediately.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Watch settings for this feed.
    pub fn settings(&self) -> WatchSettings {
        self.settings
    }

    /// Deterministic endpoint name for this feed, so the endpoint can be
    /// located or re-created idempotently.
    pub fn endpoint_name(&self) -> String {
        format!("r/{}", self.source_id)
    }

    /// Cached display metadata, if loaded.
    pub async fn info(&self) -> Option<SourceInfo> {
        self.info.read().await.clone()
    }

    /// Cache display metadata. Called once by the owning monitor.
    pub async fn set_info(&self, info: SourceInfo) {
        *self.info.write().await = Some(info);
    }

    /// Cached endpoint handle, if any.
    pub async fn endpoint(&self) -> Option<Endpoint> {
        self.endpoint.read().await.clone()
    }

    /// Replace the cached endpoint handle.
    pub async fn set_endpoint(&self, endpoint: Endpoint) {
        *self.endpoint.write().await = Some(endpoint);
    }

    /// Drop the cached endpoint handle, forcing re-resolution.
    pub async fn clear_endpoint(&self) {
        *self.endpoint.write().await = None;
    }

    /// Whether the feed has been permanently stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Register a watch for an item if none is in flight.
    ///
    /// The check, the spawn, and the insertion happen under one lock hold
    /// so a finishing task can never observe a half-registered entry.
    /// Returns false when a watch for the item already exists or the feed
    /// is stopped.
    pub async fn try_register_watch<F>(&self, item_id: &str, spawn: F) -> bool
    where
        F: FnOnce() -> JoinHandle<()>,
    {
        if self.is_stopped() {
            return false;
        }
        let mut watches = self.watches.lock().await;
        if watches.contains_key(item_id) {
            return false;
        }
        watches.insert(item_id.to_string(), spawn());
        true
    }

    /// Remove a watch entry. Called by the watch task itself on any
    /// terminal transition, so the entry is gone before anything can
    /// re-trigger a dispatch.
    pub async fn finish_watch(&self, item_id: &str) {
        self.watches.lock().await.remove(item_id);
    }

    /// Whether a watch for the item is currently in flight.
    pub async fn is_watching(&self, item_id: &str) -> bool {
        self.watches.lock().await.contains_key(item_id)
    }

    /// Item ids currently being watched.
    pub async fn watched_ids(&self) -> Vec<String> {
        self.watches.lock().await.keys().cloned().collect()
    }

    /// Number of in-flight watches.
    pub async fn watch_count(&self) -> usize {
        self.watches.lock().await.len()
    }

    /// Record the subscription loop's task handle.
    pub async fn set_loop_handle(&self, handle: JoinHandle<()>) {
        *self.loop_handle.lock().await = Some(handle);
    }

    /// Permanently stop this feed.
    ///
    /// Aborts the subscription loop and every outstanding watch, then
    /// clears the watch map. Safe to call more than once and safe against
    /// already-terminated tasks.
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = self.loop_handle.lock().await.take() {
            handle.abort();
        }
        let mut watches = self.watches.lock().await;
        for (_, handle) in watches.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn test_feed() -> Feed {
        Feed::new("rust", 100, 5, WatchSettings::default())
    }

    #[test]
    fn test_endpoint_name() {
        assert_eq!(test_feed().endpoint_name(), "r/rust");
    }

    #[test]
    fn test_settings_from_config() {
        let settings = WatchSettings::default();
        assert_eq!(settings.poll_interval, Duration::from_secs(360));
        assert_eq!(settings.max_attempts, 12);
        assert_eq!(settings.pacing_delay, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_register_watch_rejects_duplicate() {
        let feed = Arc::new(test_feed());

        let first = feed
            .try_register_watch("item1", || tokio::spawn(async {}))
            .await;
        assert!(first);

        let second = feed
            .try_register_watch("item1", || tokio::spawn(async {}))
            .await;
        assert!(!second);
        assert_eq!(feed.watch_count().await, 1);
    }

    #[tokio::test]
    async fn test_finish_watch_removes_entry() {
        let feed = test_feed();
        feed.try_register_watch("item1", || tokio::spawn(async {}))
            .await;
        feed.finish_watch("item1").await;
        assert!(!feed.is_watching("item1").await);
        assert_eq!(feed.watch_count().await, 0);
    }

    #[tokio::test]
    async fn test_stop_clears_watches_and_blocks_registration() {
        let feed = test_feed();
        feed.try_register_watch("item1", || {
            tokio::spawn(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            })
        })
        .await;

        feed.stop().await;
        assert!(feed.is_stopped());
        assert_eq!(feed.watch_count().await, 0);

        let registered = feed
            .try_register_watch("item2", || tokio::spawn(async {}))
            .await;
        assert!(!registered);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let feed = test_feed();
        feed.stop().await;
        feed.stop().await;
        assert!(feed.is_stopped());
    }

    #[tokio::test]
    async fn test_endpoint_replacement() {
        let feed = test_feed();
        assert!(feed.endpoint().await.is_none());

        feed.set_endpoint(Endpoint::new("r/rust", "mock://a")).await;
        assert_eq!(feed.endpoint().await.unwrap().url, "mock://a");

        feed.clear_endpoint().await;
        assert!(feed.endpoint().await.is_none());

        feed.set_endpoint(Endpoint::new("r/rust", "mock://b")).await;
        assert_eq!(feed.endpoint().await.unwrap().url, "mock://b");
    }
}
