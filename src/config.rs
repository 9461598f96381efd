//! Configuration module for subwatch.

use serde::Deserialize;
use std::path::Path;

use crate::{Result, SubwatchError};

/// Item source configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the content site's JSON API.
    #[serde(default = "default_source_api_base")]
    pub api_base: String,
    /// User agent string sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Interval in seconds between polls of a feed's listing.
    #[serde(default = "default_stream_poll_interval")]
    pub stream_poll_interval_secs: u64,
}

fn default_source_api_base() -> String {
    "https://reddit.com".to_string()
}

fn default_user_agent() -> String {
    "subwatch/0.1 (feed monitor)".to_string()
}

fn default_stream_poll_interval() -> u64 {
    30
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_base: default_source_api_base(),
            user_agent: default_user_agent(),
            stream_poll_interval_secs: default_stream_poll_interval(),
        }
    }
}

/// Notification sink configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    /// Base URL of the chat platform's REST API.
    #[serde(default = "default_sink_api_base")]
    pub api_base: String,
    /// Bot token used for endpoint management calls.
    #[serde(default)]
    pub token: String,
}

fn default_sink_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            api_base: default_sink_api_base(),
            token: String::new(),
        }
    }
}

/// Watch settings applied to every feed.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    /// Seconds between score polls of a watched item.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Number of score polls before a watch gives up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Seconds to pause between consecutive newly observed items.
    #[serde(default = "default_pacing_delay")]
    pub pacing_delay_secs: u64,
}

fn default_poll_interval() -> u64 {
    360
}

fn default_max_attempts() -> u32 {
    12
}

fn default_pacing_delay() -> u64 {
    10
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_attempts: default_max_attempts(),
            pacing_delay_secs: default_pacing_delay(),
        }
    }
}

/// Feed snapshot persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedsConfig {
    /// Path to the persisted feed snapshot file.
    #[serde(default = "default_feeds_path")]
    pub path: String,
}

fn default_feeds_path() -> String {
    "data/feeds.json".to_string()
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            path: default_feeds_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/subwatch.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Item source configuration.
    #[serde(default)]
    pub source: SourceConfig,
    /// Notification sink configuration.
    #[serde(default)]
    pub sink: SinkConfig,
    /// Watch settings.
    #[serde(default)]
    pub watch: WatchConfig,
    /// Feed snapshot persistence.
    #[serde(default)]
    pub feeds: FeedsConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| SubwatchError::Config(e.to_string()))
    }
}
