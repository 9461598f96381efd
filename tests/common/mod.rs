//! Test helpers for subwatch integration tests.
//!
//! Provides scriptable in-memory implementations of the item source and
//! the notification sink, so the monitoring core can be driven without
//! network access.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use futures::stream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use subwatch::sink::{ChannelId, Endpoint, Message, NotificationSink};
use subwatch::source::{Item, ItemSource, ItemStream, SourceInfo};
use subwatch::{Result, SubwatchError};

/// Build a minimal item for tests.
pub fn make_item(id: &str, score: i64) -> Item {
    Item {
        id: id.to_string(),
        title: format!("Post {id}"),
        url: format!("https://example.com/{id}"),
        author: "someone".to_string(),
        created_at: Utc::now(),
        score,
        body: None,
        permalink: format!("/r/test/comments/{id}/post/"),
    }
}

/// Scriptable in-memory item source.
#[derive(Default)]
pub struct MockItemSource {
    known_sources: Mutex<HashSet<String>>,
    infos: Mutex<HashMap<String, SourceInfo>>,
    items: Mutex<HashMap<String, Item>>,
    scores: Mutex<HashMap<String, VecDeque<i64>>>,
    fetch_failures: Mutex<HashSet<String>>,
    fetch_counts: Mutex<HashMap<String, u32>>,
    streams: Mutex<HashMap<String, UnboundedReceiver<Result<Item>>>>,
}

impl MockItemSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `probe` succeed for a source.
    pub fn allow_source(&self, source_id: &str) {
        self.known_sources
            .lock()
            .unwrap()
            .insert(source_id.to_string());
    }

    /// Set the metadata returned by `load`.
    pub fn set_info(&self, source_id: &str, info: SourceInfo) {
        self.infos
            .lock()
            .unwrap()
            .insert(source_id.to_string(), info);
    }

    /// Register an item for point lookups.
    pub fn add_item(&self, item: Item) {
        self.items.lock().unwrap().insert(item.id.clone(), item);
    }

    /// Script the scores successive `fetch_item` calls will report for an
    /// item. When the script runs out, the last value repeats.
    pub fn set_scores(&self, item_id: &str, scores: Vec<i64>) {
        self.scores
            .lock()
            .unwrap()
            .insert(item_id.to_string(), scores.into());
    }

    /// Make `fetch_item` fail for an item.
    pub fn fail_fetch(&self, item_id: &str) {
        self.fetch_failures
            .lock()
            .unwrap()
            .insert(item_id.to_string());
    }

    /// How many times `fetch_item` was called for an item.
    pub fn fetch_count(&self, item_id: &str) -> u32 {
        self.fetch_counts
            .lock()
            .unwrap()
            .get(item_id)
            .copied()
            .unwrap_or(0)
    }

    /// Wire up the live stream for a source. Items (or errors) sent on the
    /// returned sender are emitted by the next `subscribe` call.
    pub fn stream_sender(&self, source_id: &str) -> UnboundedSender<Result<Item>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams
            .lock()
            .unwrap()
            .insert(source_id.to_string(), rx);
        tx
    }
}

#[async_trait]
impl ItemSource for MockItemSource {
    async fn probe(&self, source_id: &str) -> Result<bool> {
        Ok(self.known_sources.lock().unwrap().contains(source_id))
    }

    async fn load(&self, source_id: &str) -> Result<SourceInfo> {
        Ok(self
            .infos
            .lock()
            .unwrap()
            .get(source_id)
            .cloned()
            .unwrap_or_else(|| SourceInfo::new(source_id)))
    }

    async fn fetch_item(&self, item_id: &str) -> Result<Item> {
        *self
            .fetch_counts
            .lock()
            .unwrap()
            .entry(item_id.to_string())
            .or_insert(0) += 1;

        if self.fetch_failures.lock().unwrap().contains(item_id) {
            return Err(SubwatchError::ItemFetch(format!(
                "scripted failure for {item_id}"
            )));
        }

        let mut item = self
            .items
            .lock()
            .unwrap()
            .get(item_id)
            .cloned()
            .ok_or_else(|| SubwatchError::NotFound(format!("item {item_id}")))?;

        let mut scores = self.scores.lock().unwrap();
        if let Some(script) = scores.get_mut(item_id) {
            if script.len() > 1 {
                item.score = script.pop_front().unwrap();
            } else if let Some(&last) = script.front() {
                item.score = last;
            }
        }
        Ok(item)
    }

    fn subscribe(&self, source_id: &str) -> ItemStream {
        match self.streams.lock().unwrap().remove(source_id) {
            Some(rx) => Box::pin(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })),
            None => Box::pin(stream::pending::<Result<Item>>()),
        }
    }
}

/// Scriptable in-memory notification sink.
#[derive(Default)]
pub struct MockSink {
    endpoints: Mutex<HashMap<(ChannelId, String), Endpoint>>,
    deliveries: Mutex<Vec<(String, Message)>>,
    send_attempts: AtomicU32,
    create_calls: AtomicU32,
    gone_channels: Mutex<HashSet<ChannelId>>,
    forbidden_channels: Mutex<HashSet<ChannelId>>,
    dead_endpoints: Mutex<HashSet<String>>,
    kill_on_create: AtomicBool,
    next_id: AtomicU32,
}

impl MockSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make endpoint operations on a channel fail with `ChannelGone`.
    pub fn mark_channel_gone(&self, channel_id: ChannelId) {
        self.gone_channels.lock().unwrap().insert(channel_id);
    }

    /// Make endpoint creation in a channel fail with `Forbidden`.
    pub fn mark_forbidden(&self, channel_id: ChannelId) {
        self.forbidden_channels.lock().unwrap().insert(channel_id);
    }

    /// Delete an endpoint: sends through it fail with `EndpointGone`.
    pub fn kill_endpoint(&self, url: &str) {
        self.endpoints
            .lock()
            .unwrap()
            .retain(|_, ep| ep.url != url);
        self.dead_endpoints.lock().unwrap().insert(url.to_string());
    }

    /// Make every endpoint created from now on dead on arrival.
    pub fn kill_future_endpoints(&self) {
        self.kill_on_create.store(true, Ordering::SeqCst);
    }

    /// Messages delivered successfully, in order.
    pub fn delivered(&self) -> Vec<Message> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn delivered_count(&self) -> usize {
        self.deliveries.lock().unwrap().len()
    }

    /// Send attempts including failed ones.
    pub fn send_attempt_count(&self) -> u32 {
        self.send_attempts.load(Ordering::SeqCst)
    }

    pub fn create_call_count(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Whether an endpoint with the given name exists in a channel.
    pub fn has_endpoint(&self, channel_id: ChannelId, name: &str) -> bool {
        self.endpoints
            .lock()
            .unwrap()
            .contains_key(&(channel_id, name.to_string()))
    }
}

#[async_trait]
impl NotificationSink for MockSink {
    async fn find_endpoint(&self, channel_id: ChannelId, name: &str) -> Result<Option<Endpoint>> {
        if self.gone_channels.lock().unwrap().contains(&channel_id) {
            return Err(SubwatchError::ChannelGone);
        }
        Ok(self
            .endpoints
            .lock()
            .unwrap()
            .get(&(channel_id, name.to_string()))
            .cloned())
    }

    async fn create_endpoint(
        &self,
        channel_id: ChannelId,
        name: &str,
        _icon_url: Option<&str>,
    ) -> Result<Endpoint> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.gone_channels.lock().unwrap().contains(&channel_id) {
            return Err(SubwatchError::ChannelGone);
        }
        if self.forbidden_channels.lock().unwrap().contains(&channel_id) {
            return Err(SubwatchError::Forbidden("missing manage webhooks".to_string()));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let endpoint = Endpoint::new(name, format!("mock://{channel_id}/{name}/{n}"));
        if self.kill_on_create.load(Ordering::SeqCst) {
            self.dead_endpoints
                .lock()
                .unwrap()
                .insert(endpoint.url.clone());
        } else {
            self.endpoints
                .lock()
                .unwrap()
                .insert((channel_id, name.to_string()), endpoint.clone());
        }
        Ok(endpoint)
    }

    async fn send(&self, endpoint: &Endpoint, message: &Message) -> Result<()> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if self.dead_endpoints.lock().unwrap().contains(&endpoint.url) {
            return Err(SubwatchError::EndpointGone);
        }
        self.deliveries
            .lock()
            .unwrap()
            .push((endpoint.url.clone(), message.clone()));
        Ok(())
    }
}

/// Let spawned tasks and expired timers run under paused time.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}
