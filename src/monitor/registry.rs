//! Feed registry for subwatch.
//!
//! Process-wide table of feed monitors keyed by destination channel. Owns
//! monitor creation and teardown, enforces the one-feed-per-source-per-
//! channel invariant, and (de)serializes the persisted configuration
//! snapshot.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::monitor::dispatch::Dispatcher;
use crate::monitor::feed::{Feed, WatchSettings};
use crate::monitor::subscription::FeedMonitor;
use crate::sink::types::{ChannelId, Endpoint};
use crate::source::ItemSource;
use crate::{Result, SubwatchError};

/// Persisted form of one feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSnapshot {
    /// Source identifier.
    pub source_id: String,
    /// Popularity threshold.
    pub threshold: u32,
    /// Item ids with an in-flight watch at save time. Resumed watches
    /// restart with a full retry budget.
    #[serde(default)]
    pub watching: Vec<String>,
    /// Cached endpoint URL, if one was resolved.
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

/// Persisted form of all feeds, keyed by destination channel.
pub type RegistrySnapshot = HashMap<ChannelId, Vec<FeedSnapshot>>;

/// Table of active feed monitors, keyed by destination channel.
pub struct FeedRegistry {
    source: Arc<dyn ItemSource>,
    dispatcher: Arc<Dispatcher>,
    settings: WatchSettings,
    monitors: RwLock<HashMap<ChannelId, Vec<FeedMonitor>>>,
}

impl FeedRegistry {
    /// Create an empty registry.
    pub fn new(
        source: Arc<dyn ItemSource>,
        dispatcher: Arc<Dispatcher>,
        settings: WatchSettings,
    ) -> Self {
        Self {
            source,
            dispatcher,
            settings,
            monitors: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe a channel to a source.
    ///
    /// Probes the source for existence first and rejects duplicates within
    /// the channel.
    pub async fn subscribe(
        &self,
        channel_id: ChannelId,
        source_id: &str,
        threshold: u32,
    ) -> Result<()> {
        if !self.source.probe(source_id).await? {
            return Err(SubwatchError::NotFound(format!("source {source_id}")));
        }

        let mut monitors = self.monitors.write().await;
        let channel_monitors = monitors.entry(channel_id).or_default();
        if channel_monitors.iter().any(|m| m.source_id() == source_id) {
            return Err(SubwatchError::Validation(format!(
                "r/{source_id} is already being fed to this channel"
            )));
        }

        let monitor = self.build_monitor(channel_id, source_id, threshold, None);
        monitor.start(Vec::new()).await;
        channel_monitors.push(monitor);
        info!("subscribed channel {} to r/{}", channel_id, source_id);
        Ok(())
    }

    /// Remove one feed from a channel, cancelling its loop and watches.
    pub async fn unsubscribe(&self, channel_id: ChannelId, source_id: &str) -> Result<()> {
        let mut monitors = self.monitors.write().await;
        let channel_monitors = monitors
            .get_mut(&channel_id)
            .ok_or_else(|| SubwatchError::NotFound(format!("feed r/{source_id}")))?;

        let position = channel_monitors
            .iter()
            .position(|m| m.source_id() == source_id)
            .ok_or_else(|| SubwatchError::NotFound(format!("feed r/{source_id}")))?;

        let monitor = channel_monitors.remove(position);
        monitor.stop().await;
        if channel_monitors.is_empty() {
            monitors.remove(&channel_id);
        }
        info!("unsubscribed channel {} from r/{}", channel_id, source_id);
        Ok(())
    }

    /// Remove every feed of a deleted channel.
    pub async fn remove_channel(&self, channel_id: ChannelId) {
        if let Some(channel_monitors) = self.monitors.write().await.remove(&channel_id) {
            for monitor in &channel_monitors {
                monitor.stop().await;
            }
            info!("removed all feeds for channel {}", channel_id);
        }
    }

    /// Whether a channel is subscribed to a source.
    pub async fn is_subscribed(&self, channel_id: ChannelId, source_id: &str) -> bool {
        self.monitors
            .read()
            .await
            .get(&channel_id)
            .map(|ms| ms.iter().any(|m| m.source_id() == source_id))
            .unwrap_or(false)
    }

    /// Number of active feeds across all channels.
    pub async fn feed_count(&self) -> usize {
        self.monitors.read().await.values().map(Vec::len).sum()
    }

    /// Reconstruct monitors from a snapshot and start them.
    ///
    /// Watches listed in the snapshot are resumed with a full retry
    /// budget; history is not replayed.
    pub async fn restore(&self, snapshot: RegistrySnapshot) {
        let mut monitors = self.monitors.write().await;
        for (channel_id, feeds) in snapshot {
            let channel_monitors = monitors.entry(channel_id).or_default();
            for entry in feeds {
                if channel_monitors
                    .iter()
                    .any(|m| m.source_id() == entry.source_id)
                {
                    continue;
                }
                let endpoint_url = entry.endpoint_url.clone();
                let monitor = self.build_monitor(
                    channel_id,
                    &entry.source_id,
                    entry.threshold,
                    endpoint_url,
                );
                monitor.start(entry.watching).await;
                channel_monitors.push(monitor);
            }
        }
    }

    /// Capture the current state of all feeds.
    pub async fn snapshot(&self) -> RegistrySnapshot {
        let monitors = self.monitors.read().await;
        let mut snapshot = RegistrySnapshot::new();
        for (channel_id, channel_monitors) in monitors.iter() {
            let mut feeds = Vec::with_capacity(channel_monitors.len());
            for monitor in channel_monitors {
                let feed = monitor.feed();
                feeds.push(FeedSnapshot {
                    source_id: feed.source_id().to_string(),
                    threshold: feed.threshold(),
                    watching: feed.watched_ids().await,
                    endpoint_url: feed.endpoint().await.map(|e| e.url),
                });
            }
            snapshot.insert(*channel_id, feeds);
        }
        snapshot
    }

    /// Load a snapshot file.
    pub fn load_file(path: impl AsRef<Path>) -> Result<RegistrySnapshot> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save a snapshot file, creating the parent directory if needed.
    pub fn save_file(path: impl AsRef<Path>, snapshot: &RegistrySnapshot) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn build_monitor(
        &self,
        channel_id: ChannelId,
        source_id: &str,
        threshold: u32,
        endpoint_url: Option<String>,
    ) -> FeedMonitor {
        let mut feed = Feed::new(source_id, channel_id, threshold, self.settings);
        if let Some(url) = endpoint_url {
            // Seed the cached handle so the first dispatch after a restart
            // does not have to re-resolve it.
            let endpoint = Endpoint::new(feed.endpoint_name(), url);
            feed = feed.with_endpoint(endpoint);
        }
        FeedMonitor::new(
            Arc::new(feed),
            Arc::clone(&self.source),
            Arc::clone(&self.dispatcher),
        )
    }
}
