//! Alert event types

use std::fmt;

use serde::Serialize;

/// Kind of detection rule that produced an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Serving pool changed
    Failover,
    /// Upstream 5xx rate crossed the threshold
    ErrorRate,
}

impl AlertKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Failover => "failover",
            Self::ErrorRate => "error_rate",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity, rendered as the attachment color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Traffic moved to the green pool
    Green,
    /// Traffic moved to any other pool
    Info,
    /// Elevated upstream errors
    Critical,
}

impl Severity {
    /// Slack attachment color for this severity
    pub const fn color(&self) -> &'static str {
        match self {
            Self::Green => "#36a64f",
            Self::Info => "#439FE0",
            Self::Critical => "#ff0000",
        }
    }
}

/// A notification produced by the detector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub title: String,
    pub body: String,
    pub severity: Severity,
}
