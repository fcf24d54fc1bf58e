//! Failover and error-rate detection
//!
//! [`DetectorState`] consumes one [`RequestOutcome`] at a time and decides
//! whether an alert should be sent. Two rules are evaluated per record:
//!
//! - **Failover**: the serving pool differs from the last pool seen. The
//!   first pool observed after startup never alerts.
//! - **Error rate**: the share of recent requests whose upstream attempts
//!   included a 5xx reaches the threshold. Not evaluated until the window
//!   holds `max(10, window_size / 2)` samples, capped at `window_size`.
//!
//! Both rules share per-kind cooldowns. Maintenance mode keeps every piece
//! of state moving but never emits an alert.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::cooldown::Cooldowns;
use super::event::{AlertEvent, AlertKind, Severity};
use super::window::OutcomeWindow;
use crate::config::WatcherConfig;
use crate::ingest::RequestOutcome;

/// Smallest sample count before the error-rate rule is evaluated
const MIN_SAMPLE_FLOOR: usize = 10;

/// Samples required before the error-rate rule runs for a given window.
///
/// Never more than the window can hold.
pub fn min_samples_for(window_size: usize) -> usize {
    MIN_SAMPLE_FLOOR.max(window_size / 2).min(window_size.max(1))
}

/// Detection parameters, fixed for the process lifetime
#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// Error-rate trigger level in percent (inclusive)
    pub threshold_pct: f64,
    /// Rolling window capacity
    pub window_size: usize,
    /// Minimum spacing between same-kind alerts
    pub cooldown: Duration,
    /// Suppress alert emission
    pub maintenance_mode: bool,
}

impl From<&WatcherConfig> for DetectorSettings {
    fn from(config: &WatcherConfig) -> Self {
        Self {
            threshold_pct: config.threshold_pct,
            window_size: config.window_size,
            cooldown: config.cooldown,
            maintenance_mode: config.maintenance_mode,
        }
    }
}

impl DetectorSettings {
    /// Samples required before the error-rate rule runs
    pub fn min_samples(&self) -> usize {
        min_samples_for(self.window_size)
    }
}

/// Stateful detector for pool flips and upstream error rate
#[derive(Debug, Clone)]
pub struct DetectorState {
    settings: DetectorSettings,
    window: OutcomeWindow,
    last_pool: Option<String>,
    cooldowns: Cooldowns,
}

impl DetectorState {
    pub fn new(settings: DetectorSettings) -> Self {
        Self {
            window: OutcomeWindow::new(settings.window_size),
            cooldowns: Cooldowns::new(settings.cooldown),
            last_pool: None,
            settings,
        }
    }

    /// Process one record, returning the alerts it triggers
    pub fn observe(&mut self, record: &RequestOutcome, now: DateTime<Utc>) -> Vec<AlertEvent> {
        let mut alerts = Vec::new();

        if let Some(alert) = self.check_failover(record, now) {
            alerts.push(alert);
        }
        if let Some(alert) = self.check_error_rate(record, now) {
            alerts.push(alert);
        }

        alerts
    }

    fn check_failover(&mut self, record: &RequestOutcome, now: DateTime<Utc>) -> Option<AlertEvent> {
        let pool = record.pool.as_deref()?;

        let previous = match self.last_pool.replace(pool.to_string()) {
            // First pool seen since startup
            None => return None,
            Some(previous) if previous == pool => return None,
            Some(previous) => previous,
        };

        if self.settings.maintenance_mode {
            tracing::debug!(from = %previous, to = %pool, "Failover suppressed (maintenance mode)");
            return None;
        }
        if !self.cooldowns.should_alert(AlertKind::Failover, now) {
            tracing::debug!(from = %previous, to = %pool, "Failover suppressed (cooldown)");
            return None;
        }

        self.cooldowns.mark(AlertKind::Failover, now);

        let severity = if pool == "green" {
            Severity::Green
        } else {
            Severity::Info
        };

        Some(AlertEvent {
            kind: AlertKind::Failover,
            title: format!("Failover detected: {} → {}", previous, pool),
            body: format!(
                "Now serving: *{}* (release `{}`)\nupstream: `{}`\nrequest_time: `{}`",
                pool, record.release, record.upstream_addr, record.request_time
            ),
            severity,
        })
    }

    fn check_error_rate(&mut self, record: &RequestOutcome, now: DateTime<Utc>) -> Option<AlertEvent> {
        self.window.push(record.had_upstream_5xx());

        if self.window.len() < self.settings.min_samples() {
            return None;
        }

        let rate = self.window.error_rate()?;
        if rate < self.settings.threshold_pct {
            return None;
        }

        if self.settings.maintenance_mode {
            tracing::debug!(rate = rate, "Error-rate alert suppressed (maintenance mode)");
            return None;
        }
        if !self.cooldowns.should_alert(AlertKind::ErrorRate, now) {
            tracing::debug!(rate = rate, "Error-rate alert suppressed (cooldown)");
            return None;
        }

        self.cooldowns.mark(AlertKind::ErrorRate, now);

        Some(AlertEvent {
            kind: AlertKind::ErrorRate,
            title: "High upstream error rate".to_string(),
            body: format!(
                "5xx in upstream attempts: *{:.2}%* over last {} requests (threshold {}%).\n\
                 Last pool: `{}`\n\
                 Recent upstream_status: `{}` @ `{}`\n\
                 Final LB status (for info): `{}`",
                rate,
                self.window.len(),
                self.settings.threshold_pct,
                self.last_pool.as_deref().unwrap_or("None"),
                record.upstream_status,
                record.upstream_addr,
                record.final_status
            ),
            severity: Severity::Critical,
        })
    }

    /// Toggle maintenance mode; state keeps advancing either way
    pub fn set_maintenance_mode(&mut self, enabled: bool) {
        self.settings.maintenance_mode = enabled;
    }

    pub fn maintenance_mode(&self) -> bool {
        self.settings.maintenance_mode
    }

    /// Most recent non-empty pool label
    pub fn last_pool(&self) -> Option<&str> {
        self.last_pool.as_deref()
    }

    pub fn window(&self) -> &OutcomeWindow {
        &self.window
    }

    pub fn cooldowns(&self) -> &Cooldowns {
        &self.cooldowns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn settings() -> DetectorSettings {
        DetectorSettings {
            threshold_pct: 2.0,
            window_size: 200,
            cooldown: Duration::from_secs(300),
            maintenance_mode: false,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn pool(name: &str) -> RequestOutcome {
        RequestOutcome {
            pool: Some(name.to_string()),
            release: format!("{}-v1", name),
            upstream_status: "200".to_string(),
            upstream_addr: "10.0.0.5:3000".to_string(),
            request_time: "0.004".to_string(),
            ..Default::default()
        }
    }

    fn upstream(status: &str) -> RequestOutcome {
        RequestOutcome {
            upstream_status: status.to_string(),
            upstream_addr: "10.0.0.6:3000".to_string(),
            final_status: "200".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_pool_does_not_alert() {
        let mut detector = DetectorState::new(settings());
        assert!(detector.observe(&pool("blue"), at(0)).is_empty());
        assert_eq!(detector.last_pool(), Some("blue"));
    }

    #[test]
    fn test_failover_alert_content() {
        let mut detector = DetectorState::new(settings());
        detector.observe(&pool("blue"), at(0));

        let alerts = detector.observe(&pool("green"), at(1));
        assert_eq!(alerts.len(), 1);

        let alert = &alerts[0];
        assert_eq!(alert.kind, AlertKind::Failover);
        assert_eq!(alert.title, "Failover detected: blue → green");
        assert!(alert.body.contains("Now serving: *green* (release `green-v1`)"));
        assert!(alert.body.contains("upstream: `10.0.0.5:3000`"));
        assert!(alert.body.contains("request_time: `0.004`"));
        assert_eq!(alert.severity, Severity::Green);
        assert_eq!(detector.cooldowns().last_fired(AlertKind::Failover), Some(at(1)));
    }

    #[test]
    fn test_failover_to_non_green_is_info() {
        let mut detector = DetectorState::new(settings());
        detector.observe(&pool("green"), at(0));
        let alerts = detector.observe(&pool("blue"), at(1));
        assert_eq!(alerts[0].severity, Severity::Info);
    }

    #[test]
    fn test_records_without_pool_keep_last_pool() {
        let mut detector = DetectorState::new(settings());
        detector.observe(&pool("blue"), at(0));
        assert!(detector.observe(&upstream("200"), at(1)).is_empty());
        assert_eq!(detector.last_pool(), Some("blue"));
        assert_eq!(detector.window().len(), 2);
    }

    #[test]
    fn test_flapping_within_cooldown() {
        let mut detector = DetectorState::new(settings());
        let mut fired = Vec::new();
        for (i, name) in ["blue", "blue", "green", "blue"].iter().enumerate() {
            fired.extend(detector.observe(&pool(name), at(i as i64 / 4)));
        }

        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].title, "Failover detected: blue → green");
        assert_eq!(detector.last_pool(), Some("blue"));
    }

    #[test]
    fn test_failover_after_cooldown_reports_latest_transition() {
        let mut detector = DetectorState::new(settings());
        detector.observe(&pool("blue"), at(0));
        assert_eq!(detector.observe(&pool("green"), at(1)).len(), 1);
        // Suppressed, but tracked
        assert!(detector.observe(&pool("blue"), at(2)).is_empty());
        assert!(detector.observe(&pool("blue"), at(400)).is_empty());

        let alerts = detector.observe(&pool("green"), at(401));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "Failover detected: blue → green");
    }

    #[test]
    fn test_error_rate_waits_for_min_samples() {
        let mut detector = DetectorState::new(settings());
        for i in 0..99 {
            assert!(detector.observe(&upstream("502"), at(i)).is_empty());
        }
        let alerts = detector.observe(&upstream("502"), at(99));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::ErrorRate);
    }

    #[test]
    fn test_error_rate_threshold_is_inclusive() {
        let mut detector = DetectorState::new(DetectorSettings {
            threshold_pct: 10.0,
            window_size: 20,
            ..settings()
        });
        detector.observe(&upstream("500"), at(0));
        for i in 1..9 {
            assert!(detector.observe(&upstream("200"), at(i)).is_empty());
        }
        // 1 of 10 = 10%
        let alerts = detector.observe(&upstream("200"), at(9));
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn test_error_rate_alert_content() {
        let mut detector = DetectorState::new(DetectorSettings {
            window_size: 20,
            ..settings()
        });
        detector.observe(&pool("blue"), at(0));
        for i in 1..9 {
            detector.observe(&upstream("200"), at(i));
        }
        let alerts = detector.observe(&upstream("502, 200"), at(10));
        assert_eq!(alerts.len(), 1);

        let alert = &alerts[0];
        assert_eq!(alert.title, "High upstream error rate");
        assert_eq!(alert.severity, Severity::Critical);
        assert!(alert.body.contains("*10.00%* over last 10 requests (threshold 2%)"));
        assert!(alert.body.contains("Last pool: `blue`"));
        assert!(alert.body.contains("Recent upstream_status: `502, 200` @ `10.0.0.6:3000`"));
        assert!(alert.body.contains("Final LB status (for info): `200`"));
    }

    #[test]
    fn test_error_rate_cooldown() {
        let mut detector = DetectorState::new(DetectorSettings {
            window_size: 10,
            ..settings()
        });
        for i in 0..9 {
            detector.observe(&upstream("503"), at(i));
        }
        assert_eq!(detector.observe(&upstream("503"), at(10)).len(), 1);
        assert!(detector.observe(&upstream("503"), at(309)).is_empty());
        assert_eq!(detector.observe(&upstream("503"), at(310)).len(), 1);
    }

    #[test]
    fn test_one_record_can_trigger_both_rules() {
        let mut detector = DetectorState::new(DetectorSettings {
            window_size: 10,
            ..settings()
        });
        detector.observe(&pool("blue"), at(0));
        for i in 1..9 {
            detector.observe(&upstream("200"), at(i));
        }
        let mut record = pool("green");
        record.upstream_status = "502".to_string();

        let alerts = detector.observe(&record, at(9));
        let kinds: Vec<AlertKind> = alerts.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AlertKind::Failover, AlertKind::ErrorRate]);
    }

    #[test]
    fn test_maintenance_mode_tracks_state_silently() {
        let mut detector = DetectorState::new(DetectorSettings {
            maintenance_mode: true,
            window_size: 10,
            ..settings()
        });
        detector.observe(&pool("blue"), at(0));
        for i in 1..20 {
            assert!(detector.observe(&upstream("500"), at(i)).is_empty());
        }
        assert!(detector.observe(&pool("green"), at(21)).is_empty());

        assert_eq!(detector.last_pool(), Some("green"));
        assert_eq!(detector.window().error_count(), 9);
        assert_eq!(detector.cooldowns().last_fired(AlertKind::ErrorRate), None);
        assert_eq!(detector.cooldowns().last_fired(AlertKind::Failover), None);
    }

    #[test]
    fn test_leaving_maintenance_needs_new_record() {
        let mut detector = DetectorState::new(DetectorSettings {
            maintenance_mode: true,
            window_size: 10,
            ..settings()
        });
        detector.observe(&pool("blue"), at(0));
        detector.observe(&pool("green"), at(1));
        for i in 2..12 {
            detector.observe(&upstream("500"), at(i));
        }

        detector.set_maintenance_mode(false);
        assert!(!detector.maintenance_mode());

        // Pool is unchanged, so only the error rate fires on the next record
        let alerts = detector.observe(&pool("green"), at(12));
        let kinds: Vec<AlertKind> = alerts.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AlertKind::ErrorRate]);
    }

    #[test]
    fn test_min_samples_derived_from_window() {
        assert_eq!(min_samples_for(200), 100);
        assert_eq!(min_samples_for(30), 15);
        assert_eq!(min_samples_for(20), 10);
        assert_eq!(min_samples_for(12), 10);
        assert_eq!(min_samples_for(6), 6);
        assert_eq!(min_samples_for(1), 1);
        assert_eq!(settings().min_samples(), 100);
    }

    #[test]
    fn test_small_window_can_still_alert() {
        let mut detector = DetectorState::new(DetectorSettings {
            window_size: 5,
            ..settings()
        });
        for i in 0..4 {
            assert!(detector.observe(&upstream("502"), at(i)).is_empty());
        }
        let alerts = detector.observe(&upstream("502"), at(4));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::ErrorRate);
    }

    #[test]
    fn test_duplicate_records_are_not_deduplicated() {
        let mut detector = DetectorState::new(settings());
        let record = upstream("200");
        detector.observe(&record, at(0));
        detector.observe(&record, at(0));
        assert_eq!(detector.window().len(), 2);
    }
}
