//! Log watcher loop
//!
//! Reads lines from a [`LineSource`], decodes them, runs the detector and
//! hands any resulting alerts to the configured [`AlertSink`]. Everything
//! happens sequentially in arrival order.

use std::sync::Arc;

use crate::alerts::{AlertEvent, AlertSink, DetectorState};
use crate::ingest::{decode_line, LineSource, TailError};

/// Counters for the watcher loop
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WatcherStats {
    pub lines_read: u64,
    pub lines_discarded: u64,
    pub alerts_emitted: u64,
    pub delivery_failures: u64,
}

/// Tails a line source and alerts on what the detector finds
pub struct Watcher<S> {
    source: S,
    detector: DetectorState,
    sink: Arc<dyn AlertSink>,
    stats: WatcherStats,
}

impl<S: LineSource> Watcher<S> {
    pub fn new(source: S, detector: DetectorState, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            source,
            detector,
            sink,
            stats: WatcherStats::default(),
        }
    }

    /// Process lines until the source is exhausted or fails
    pub async fn run(&mut self) -> Result<(), TailError> {
        tracing::info!(
            sink = self.sink.name(),
            maintenance_mode = self.detector.maintenance_mode(),
            "Watcher started"
        );

        while let Some(line) = self.source.next_line().await? {
            self.process_line(&line).await;
        }

        tracing::info!(
            lines_read = self.stats.lines_read,
            lines_discarded = self.stats.lines_discarded,
            alerts_emitted = self.stats.alerts_emitted,
            delivery_failures = self.stats.delivery_failures,
            "Line source exhausted, watcher stopping"
        );
        Ok(())
    }

    /// Decode one line and act on it
    pub async fn process_line(&mut self, line: &str) {
        self.stats.lines_read += 1;

        let Some(record) = decode_line(line) else {
            self.stats.lines_discarded += 1;
            tracing::debug!(line_len = line.len(), "Discarding malformed log line");
            return;
        };

        let alerts = self.detector.observe(&record, chrono::Utc::now());
        for alert in alerts {
            self.dispatch(alert).await;
        }
    }

    /// Deliver an alert; failures are logged and otherwise ignored
    async fn dispatch(&mut self, alert: AlertEvent) {
        self.stats.alerts_emitted += 1;
        tracing::info!(kind = %alert.kind, title = %alert.title, "Alert triggered");

        if let Err(e) = self.sink.send(&alert).await {
            self.stats.delivery_failures += 1;
            tracing::error!(
                sink = self.sink.name(),
                kind = %alert.kind,
                error = %e,
                "Failed to deliver alert"
            );
        }
    }

    pub fn stats(&self) -> &WatcherStats {
        &self.stats
    }

    pub fn detector(&self) -> &DetectorState {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut DetectorState {
        &mut self.detector
    }
}
