//! Notification sink module for subwatch.
//!
//! The sink is the downstream the dispatcher delivers through: named,
//! channel-scoped, idempotently-creatable endpoints (webhooks) that accept
//! a rich message payload.

pub mod types;
pub mod webhook;

use async_trait::async_trait;

use crate::Result;

pub use types::{ChannelId, Endpoint, Message, MessageAuthor};
pub use webhook::WebhookSink;

/// Delivery endpoint provider consumed by the dispatcher.
///
/// Error contract: `find_endpoint` and `create_endpoint` fail with
/// [`SubwatchError::ChannelGone`](crate::SubwatchError::ChannelGone) when
/// the channel no longer exists and `create_endpoint` fails with
/// [`SubwatchError::Forbidden`](crate::SubwatchError::Forbidden) on missing
/// privilege; `send` fails with
/// [`SubwatchError::EndpointGone`](crate::SubwatchError::EndpointGone) when
/// the endpoint was deleted.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Look up an endpoint by name in a channel.
    async fn find_endpoint(&self, channel_id: ChannelId, name: &str) -> Result<Option<Endpoint>>;

    /// Create an endpoint in a channel.
    async fn create_endpoint(
        &self,
        channel_id: ChannelId,
        name: &str,
        icon_url: Option<&str>,
    ) -> Result<Endpoint>;

    /// Deliver a message through an endpoint.
    async fn send(&self, endpoint: &Endpoint, message: &Message) -> Result<()>;
}
