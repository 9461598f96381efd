//! Watch task for subwatch.
//!
//! A watch polls one item's score until it crosses the feed's threshold or
//! the retry budget runs out. All outcomes are terminal and every terminal
//! path removes the watch entry, so at most one watch per item exists at
//! any time.

use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, error};

use crate::monitor::dispatch::Dispatcher;
use crate::monitor::feed::Feed;
use crate::source::ItemSource;

/// Terminal state of a watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The score crossed the threshold and the item was handed to the
    /// dispatcher.
    Dispatched,
    /// The retry budget ran out without crossing the threshold. The item
    /// is dropped without notification.
    Exhausted,
    /// A fetch or dispatch failed. Not retried.
    Errored,
}

/// Run one watch to completion and remove its entry.
///
/// This is the body of the task registered in the feed's watch map; the
/// entry removal on the way out holds regardless of outcome.
pub async fn run_watch(
    source: Arc<dyn ItemSource>,
    dispatcher: Arc<Dispatcher>,
    feed: Arc<Feed>,
    item_id: String,
) {
    let outcome = poll_until_threshold(&source, &dispatcher, &feed, &item_id).await;
    debug!(
        "watch for item {} in r/{} ended: {:?}",
        item_id,
        feed.source_id(),
        outcome
    );
    feed.finish_watch(&item_id).await;
}

/// Poll the item at the feed's interval until a terminal state.
async fn poll_until_threshold(
    source: &Arc<dyn ItemSource>,
    dispatcher: &Arc<Dispatcher>,
    feed: &Arc<Feed>,
    item_id: &str,
) -> WatchOutcome {
    let threshold = i64::from(feed.threshold());
    let settings = feed.settings();
    let mut remaining = settings.max_attempts;
    let mut last_score = 0;

    while remaining > 0 {
        let item = match source.fetch_item(item_id).await {
            Ok(item) => item,
            Err(e) => {
                error!(
                    "watch for item {} in r/{} failed: {}",
                    item_id,
                    feed.source_id(),
                    e
                );
                return WatchOutcome::Errored;
            }
        };

        debug!(
            "checking item {} in r/{}: score {}/{} ({} attempts remaining)",
            item_id,
            feed.source_id(),
            item.score,
            threshold,
            remaining - 1
        );

        if item.score >= threshold {
            return match dispatcher.dispatch(feed, &item).await {
                Ok(_) => WatchOutcome::Dispatched,
                Err(e) => {
                    error!("dispatch of item {} failed: {}", item_id, e);
                    WatchOutcome::Errored
                }
            };
        }

        last_score = item.score;
        remaining -= 1;
        if remaining > 0 {
            sleep(settings.poll_interval).await;
        }
    }

    debug!(
        "item {} in r/{} never crossed the threshold (final score {}), dropping",
        item_id,
        feed.source_id(),
        last_score
    );
    WatchOutcome::Exhausted
}
