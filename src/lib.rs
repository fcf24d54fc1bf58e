//! Poolwatch: blue/green failover and upstream error-rate alerts
//!
//! Tails an nginx JSON access log, keeps a rolling window of recent request
//! outcomes and posts Slack notifications when the serving pool flips or the
//! share of requests with upstream 5xx responses crosses a threshold.
//!
//! # Features
//!
//! - **Failover detection**: alerts when the `pool` field changes
//! - **Error-rate detection**: rolling window over upstream attempts, so
//!   retried failures count even when the client saw a 200
//! - **Cooldowns**: per-kind minimum spacing between alerts
//! - **Maintenance mode**: state keeps updating, nothing is sent
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use poolwatch::alerts::{DetectorSettings, DetectorState, NullSink};
//! use poolwatch::ingest::{FileTailer, DEFAULT_POLL_INTERVAL};
//! use poolwatch::{Watcher, WatcherConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WatcherConfig::from_env()?;
//! let source = FileTailer::open(&config.log_file, DEFAULT_POLL_INTERVAL).await?;
//! let detector = DetectorState::new(DetectorSettings::from(&config));
//!
//! Watcher::new(source, detector, Arc::new(NullSink)).run().await?;
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod config;
pub mod ingest;
pub mod watcher;

// Re-export commonly used types
pub use alerts::{AlertEvent, AlertKind, DetectorState};
pub use config::{ConfigError, WatcherConfig};
pub use ingest::RequestOutcome;
pub use watcher::{Watcher, WatcherStats};
