//! Webhook notification sink.
//!
//! This module implements [`NotificationSink`](crate::sink::NotificationSink)
//! against a Discord-style REST API: channel webhook listing/creation with a
//! bot token, and webhook execution with an embed payload.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::SinkConfig;
use crate::sink::types::{ChannelId, Endpoint, Message};
use crate::sink::NotificationSink;
use crate::{Result, SubwatchError};

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Total request timeout in seconds.
const TOTAL_TIMEOUT_SECS: u64 = 30;

/// Embed accent color (blurple).
const EMBED_COLOR: u32 = 0x3498db;

/// Discord-style webhook client.
pub struct WebhookSink {
    client: Client,
    api_base: String,
    token: String,
}

impl WebhookSink {
    /// Create a new sink client from configuration.
    pub fn new(config: &SinkConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(TOTAL_TIMEOUT_SECS))
            .build()
            .map_err(|e| SubwatchError::Delivery(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.token)
    }

    /// Map a management-API error status to the sink error contract.
    fn map_status(status: StatusCode, context: &str) -> SubwatchError {
        match status {
            StatusCode::NOT_FOUND => SubwatchError::ChannelGone,
            StatusCode::FORBIDDEN => SubwatchError::Forbidden(context.to_string()),
            _ => SubwatchError::Delivery(format!("{context}: HTTP {status}")),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn find_endpoint(&self, channel_id: ChannelId, name: &str) -> Result<Option<Endpoint>> {
        let url = format!("{}/channels/{}/webhooks", self.api_base, channel_id);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| SubwatchError::Delivery(format!("webhook listing failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::map_status(response.status(), "webhook listing"));
        }

        let hooks: Vec<WebhookDto> = response
            .json()
            .await
            .map_err(|e| SubwatchError::Delivery(format!("invalid webhook listing: {e}")))?;

        Ok(hooks
            .into_iter()
            .find(|h| h.name.as_deref() == Some(name))
            .and_then(|h| h.into_endpoint(&self.api_base)))
    }

    async fn create_endpoint(
        &self,
        channel_id: ChannelId,
        name: &str,
        _icon_url: Option<&str>,
    ) -> Result<Endpoint> {
        // Webhook avatars require an image data upload; the embed author
        // icon carries the source icon instead.
        let url = format!("{}/channels/{}/webhooks", self.api_base, channel_id);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .map_err(|e| SubwatchError::Delivery(format!("webhook creation failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::map_status(response.status(), "webhook creation"));
        }

        let hook: WebhookDto = response
            .json()
            .await
            .map_err(|e| SubwatchError::Delivery(format!("invalid webhook payload: {e}")))?;

        hook.into_endpoint(&self.api_base)
            .ok_or_else(|| SubwatchError::Delivery("created webhook has no URL".to_string()))
    }

    async fn send(&self, endpoint: &Endpoint, message: &Message) -> Result<()> {
        let payload = ExecutePayload::from_message(message);
        let response = self
            .client
            .post(&endpoint.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SubwatchError::Delivery(format!("webhook execution failed: {e}")))?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(SubwatchError::EndpointGone),
            s => Err(SubwatchError::Delivery(format!(
                "webhook execution: HTTP {s}"
            ))),
        }
    }
}

/// Wire form of a webhook as returned by the management API.
#[derive(Debug, Deserialize)]
struct WebhookDto {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

impl WebhookDto {
    /// Convert to an [`Endpoint`], composing the execution URL from id and
    /// token when the API did not include it directly.
    fn into_endpoint(self, api_base: &str) -> Option<Endpoint> {
        let name = self.name?;
        let url = match self.url {
            Some(url) => url,
            None => {
                let token = self.token?;
                format!("{}/webhooks/{}/{}", api_base, self.id, token)
            }
        };
        Some(Endpoint::new(name, url))
    }
}

/// Webhook execution payload.
#[derive(Debug, Serialize)]
struct ExecutePayload {
    embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    url: String,
    timestamp: String,
    color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<EmbedImage>,
    author: EmbedAuthor,
    footer: EmbedFooter,
}

#[derive(Debug, Serialize)]
struct EmbedImage {
    url: String,
}

#[derive(Debug, Serialize)]
struct EmbedAuthor {
    name: String,
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbedFooter {
    text: String,
}

impl ExecutePayload {
    fn from_message(message: &Message) -> Self {
        Self {
            embeds: vec![Embed {
                title: message.title.clone(),
                url: message.url.clone(),
                timestamp: message.timestamp.to_rfc3339(),
                color: EMBED_COLOR,
                description: message.body.clone(),
                image: message
                    .image_url
                    .clone()
                    .map(|url| EmbedImage { url }),
                author: EmbedAuthor {
                    name: message.author.name.clone(),
                    url: message.author.url.clone(),
                    icon_url: message.author.icon_url.clone(),
                },
                footer: EmbedFooter {
                    text: message.footer.clone(),
                },
            }],
        }
    }
}
