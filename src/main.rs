//! Poolwatch
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - SLACK_WEBHOOK_URL: Slack incoming webhook (default: unset, alerts are only logged)
//! - ERROR_RATE_THRESHOLD: Upstream 5xx percentage that triggers an alert (default: 2)
//! - WINDOW_SIZE: Number of recent requests tracked (default: 200)
//! - ALERT_COOLDOWN_SEC: Minimum seconds between alerts of the same kind (default: 300)
//! - MAINTENANCE_MODE: "true" suppresses all alerts (default: false)
//! - LOG_FILE: nginx JSON access log (default: /var/log/nginx/access_json.log)
//! - ALERT_TIMEOUT_SEC: Webhook request timeout (default: 5)
//! - RUST_LOG: Log level (default: info)

use std::sync::Arc;

use poolwatch::alerts::{AlertSink, DetectorSettings, DetectorState, NullSink, SlackNotifier};
use poolwatch::ingest::{FileTailer, DEFAULT_POLL_INTERVAL};
use poolwatch::{Watcher, WatcherConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "poolwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match WatcherConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    tracing::info!("Poolwatch configuration:");
    tracing::info!("  Log file: {}", config.log_file.display());
    tracing::info!("  Maintenance mode: {}", config.maintenance_mode);
    tracing::info!("  Error-rate threshold: {}%", config.threshold_pct);
    tracing::info!(
        "  Window: {} requests (evaluated after {})",
        config.window_size,
        config.min_samples()
    );
    tracing::info!("  Alert cooldown: {} seconds", config.cooldown.as_secs());

    let sink: Arc<dyn AlertSink> = match &config.webhook_url {
        Some(url) => {
            tracing::info!("  Slack alerts: enabled");
            Arc::new(SlackNotifier::new(url.as_str(), config.alert_timeout)?)
        }
        None => {
            tracing::warn!("  Slack alerts: disabled (SLACK_WEBHOOK_URL not set)");
            Arc::new(NullSink)
        }
    };

    let detector = DetectorState::new(DetectorSettings::from(&config));
    let source = FileTailer::open(&config.log_file, DEFAULT_POLL_INTERVAL).await?;

    Watcher::new(source, detector, sink).run().await?;
    Ok(())
}
