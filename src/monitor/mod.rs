//! Feed monitoring core for subwatch.
//!
//! This module holds the engine: the per-feed subscription loop, the
//! per-item watch state machine, the dispatcher with endpoint
//! self-healing, and the channel-keyed feed registry.

pub mod dispatch;
pub mod feed;
pub mod registry;
pub mod subscription;
pub mod watch;

pub use dispatch::{
    DispatchOutcome, Dispatcher, IMAGE_EXTENSIONS, MAX_BODY_LENGTH, TRUNCATION_MARKER,
};
pub use feed::{Feed, WatchSettings};
pub use registry::{FeedRegistry, FeedSnapshot, RegistrySnapshot};
pub use subscription::FeedMonitor;
pub use watch::WatchOutcome;
