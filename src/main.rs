use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use subwatch::monitor::{Dispatcher, FeedRegistry, WatchSettings};
use subwatch::sink::WebhookSink;
use subwatch::source::HttpItemSource;
use subwatch::Config;

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };

    // Initialize logging
    if let Err(e) = subwatch::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        subwatch::logging::init_console_only(&config.logging.level);
    }

    info!("subwatch - subreddit feed relay");

    let source = match HttpItemSource::new(&config.source) {
        Ok(source) => Arc::new(source),
        Err(e) => {
            error!("failed to create item source: {e}");
            return;
        }
    };
    let sink = match WebhookSink::new(&config.sink) {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            error!("failed to create notification sink: {e}");
            return;
        }
    };

    let dispatcher = Arc::new(Dispatcher::new(sink, config.source.api_base.as_str()));
    let registry = FeedRegistry::new(source, dispatcher, WatchSettings::from(&config.watch));

    // Resume persisted feeds
    let feeds_path = config.feeds.path.clone();
    if Path::new(&feeds_path).exists() {
        match FeedRegistry::load_file(&feeds_path) {
            Ok(snapshot) => {
                registry.restore(snapshot).await;
                info!("resumed {} feed(s) from {}", registry.feed_count().await, feeds_path);
            }
            Err(e) => warn!("failed to load {}: {}", feeds_path, e),
        }
    }

    // Run until interrupted, then persist feed state
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to wait for shutdown signal: {e}");
    }
    info!("shutting down");

    let snapshot = registry.snapshot().await;
    if let Err(e) = FeedRegistry::save_file(&feeds_path, &snapshot) {
        error!("failed to save {}: {}", feeds_path, e);
    }
}
