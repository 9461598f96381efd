//! Feed monitor for subwatch.
//!
//! A [`FeedMonitor`] owns one feed's long-lived subscription loop and fans
//! newly observed items out to watches or immediate dispatch.

use std::sync::Arc;

use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::monitor::dispatch::Dispatcher;
use crate::monitor::feed::Feed;
use crate::monitor::watch::run_watch;
use crate::source::ItemSource;

/// Owns one feed's subscription loop and its watches.
pub struct FeedMonitor {
    feed: Arc<Feed>,
    source: Arc<dyn ItemSource>,
    dispatcher: Arc<Dispatcher>,
}

impl FeedMonitor {
    /// Create a monitor for a feed.
    pub fn new(feed: Arc<Feed>, source: Arc<dyn ItemSource>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            feed,
            source,
            dispatcher,
        }
    }

    /// The monitored feed.
    pub fn feed(&self) -> &Arc<Feed> {
        &self.feed
    }

    /// Source identifier of the monitored feed.
    pub fn source_id(&self) -> &str {
        self.feed.source_id()
    }

    /// Start the subscription loop as a background task.
    ///
    /// Every id in `already_watching` gets a resumed watch with a full
    /// retry budget; history is not replayed.
    pub async fn start(&self, already_watching: Vec<String>) {
        for item_id in already_watching {
            Self::spawn_watch(&self.source, &self.dispatcher, &self.feed, item_id).await;
        }

        let source = Arc::clone(&self.source);
        let dispatcher = Arc::clone(&self.dispatcher);
        let feed = Arc::clone(&self.feed);
        let handle = tokio::spawn(run_subscription_loop(source, dispatcher, feed));
        self.feed.set_loop_handle(handle).await;
    }

    /// Stop the feed: abort the loop and every outstanding watch.
    pub async fn stop(&self) {
        self.feed.stop().await;
    }

    /// Spawn a watch for an item unless one is already in flight.
    ///
    /// Returns false when the watch was coalesced into an existing one.
    pub(crate) async fn spawn_watch(
        source: &Arc<dyn ItemSource>,
        dispatcher: &Arc<Dispatcher>,
        feed: &Arc<Feed>,
        item_id: String,
    ) -> bool {
        let task_source = Arc::clone(source);
        let task_dispatcher = Arc::clone(dispatcher);
        let task_feed = Arc::clone(feed);
        let task_item_id = item_id.clone();
        feed.try_register_watch(&item_id, move || {
            tokio::spawn(run_watch(
                task_source,
                task_dispatcher,
                task_feed,
                task_item_id,
            ))
        })
        .await
    }
}

/// The long-lived subscription loop for one feed.
///
/// Any unhandled stream error terminates the loop permanently; it is
/// logged, never escalated, since the loop runs detached from any
/// request/response cycle.
async fn run_subscription_loop(
    source: Arc<dyn ItemSource>,
    dispatcher: Arc<Dispatcher>,
    feed: Arc<Feed>,
) {
    let info = match source.load(feed.source_id()).await {
        Ok(info) => info,
        Err(e) => {
            error!("failed to load r/{}: {}", feed.source_id(), e);
            return;
        }
    };
    feed.set_info(info).await;

    let pacing = feed.settings().pacing_delay;
    let mut stream = source.subscribe(feed.source_id());

    info!("subscription loop for r/{} started", feed.source_id());

    while let Some(next) = stream.next().await {
        if feed.is_stopped() {
            break;
        }
        match next {
            Ok(item) => {
                info!("received item {} from r/{}", item.id, feed.source_id());
                if feed.threshold() == 0 {
                    // Fire and forget; the dispatcher swallows its own
                    // failures.
                    let dispatcher = Arc::clone(&dispatcher);
                    let feed = Arc::clone(&feed);
                    tokio::spawn(async move {
                        if let Err(e) = dispatcher.dispatch(&feed, &item).await {
                            warn!("dispatch of item {} failed: {}", item.id, e);
                        }
                    });
                } else {
                    let started =
                        FeedMonitor::spawn_watch(&source, &dispatcher, &feed, item.id.clone())
                            .await;
                    if !started {
                        debug!("watch for item {} already in flight", item.id);
                    }
                }
                // Pace the loop so bursts do not hammer the source.
                sleep(pacing).await;
            }
            Err(e) => {
                error!(
                    "subscription stream for r/{} failed: {}",
                    feed.source_id(),
                    e
                );
                break;
            }
        }
    }

    debug!("subscription loop for r/{} ended", feed.source_id());
}
