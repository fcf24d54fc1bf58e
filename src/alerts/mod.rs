//! Failover and error-rate alerting
//!
//! Detection state, cooldown bookkeeping and alert delivery.

pub mod cooldown;
pub mod detector;
pub mod event;
pub mod notifier;
pub mod window;

pub use cooldown::Cooldowns;
pub use detector::{DetectorSettings, DetectorState};
pub use event::{AlertEvent, AlertKind, Severity};
pub use notifier::{AlertSink, NullSink, SinkError, SlackNotifier};
pub use window::OutcomeWindow;
