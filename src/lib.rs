//! subwatch - subreddit feed relay
//!
//! Monitors external content feeds for new items, optionally waits for an
//! item to cross a popularity threshold, and forwards qualifying items to
//! a chat-channel webhook exactly once.

pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod sink;
pub mod source;

pub use config::Config;
pub use error::{Result, SubwatchError};
pub use monitor::{
    DispatchOutcome, Dispatcher, Feed, FeedMonitor, FeedRegistry, FeedSnapshot, RegistrySnapshot,
    WatchOutcome, WatchSettings,
};
pub use sink::{ChannelId, Endpoint, Message, MessageAuthor, NotificationSink, WebhookSink};
pub use source::{HttpItemSource, Item, ItemSource, ItemStream, SourceInfo};
