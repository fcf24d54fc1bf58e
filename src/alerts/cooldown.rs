//! Per-kind alert cooldowns

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::event::AlertKind;

/// Tracks when each kind of alert was last sent
///
/// A kind that has never fired is always eligible.
#[derive(Debug, Clone)]
pub struct Cooldowns {
    cooldown: Duration,
    last_fired: HashMap<AlertKind, DateTime<Utc>>,
}

impl Cooldowns {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_fired: HashMap::new(),
        }
    }

    /// Whether an alert of `kind` may be sent at `now`
    pub fn should_alert(&self, kind: AlertKind, now: DateTime<Utc>) -> bool {
        match self.last_fired.get(&kind) {
            None => true,
            Some(last) => match (now - *last).to_std() {
                Ok(elapsed) => elapsed >= self.cooldown,
                // Clock went backwards
                Err(_) => self.cooldown.is_zero(),
            },
        }
    }

    /// Record that an alert of `kind` was attempted at `now`
    pub fn mark(&mut self, kind: AlertKind, now: DateTime<Utc>) {
        self.last_fired.insert(kind, now);
    }

    /// When `kind` last fired, if ever
    pub fn last_fired(&self, kind: AlertKind) -> Option<DateTime<Utc>> {
        self.last_fired.get(&kind).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_never_fired_is_eligible() {
        let cooldowns = Cooldowns::new(Duration::from_secs(300));
        assert!(cooldowns.should_alert(AlertKind::Failover, at(0)));
        assert!(cooldowns.should_alert(AlertKind::ErrorRate, at(0)));
        assert_eq!(cooldowns.last_fired(AlertKind::Failover), None);
    }

    #[test]
    fn test_cooldown_boundary_is_inclusive() {
        let mut cooldowns = Cooldowns::new(Duration::from_secs(300));
        cooldowns.mark(AlertKind::Failover, at(0));

        assert!(!cooldowns.should_alert(AlertKind::Failover, at(1)));
        assert!(!cooldowns.should_alert(AlertKind::Failover, at(299)));
        assert!(cooldowns.should_alert(AlertKind::Failover, at(300)));
        assert!(cooldowns.should_alert(AlertKind::Failover, at(301)));
    }

    #[test]
    fn test_kinds_are_independent() {
        let mut cooldowns = Cooldowns::new(Duration::from_secs(300));
        cooldowns.mark(AlertKind::Failover, at(0));

        assert!(!cooldowns.should_alert(AlertKind::Failover, at(10)));
        assert!(cooldowns.should_alert(AlertKind::ErrorRate, at(10)));
    }

    #[test]
    fn test_backwards_clock_suppresses() {
        let mut cooldowns = Cooldowns::new(Duration::from_secs(300));
        cooldowns.mark(AlertKind::ErrorRate, at(100));
        assert!(!cooldowns.should_alert(AlertKind::ErrorRate, at(50)));

        let mut zero = Cooldowns::new(Duration::ZERO);
        zero.mark(AlertKind::ErrorRate, at(100));
        assert!(zero.should_alert(AlertKind::ErrorRate, at(50)));
    }
}
