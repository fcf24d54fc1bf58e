//! Watcher configuration
//!
//! Read once at startup from environment variables. Invalid values are
//! rejected instead of silently replaced with defaults.

use std::path::PathBuf;
use std::time::Duration;

const ENV_WEBHOOK_URL: &str = "SLACK_WEBHOOK_URL";
const ENV_THRESHOLD: &str = "ERROR_RATE_THRESHOLD";
const ENV_WINDOW_SIZE: &str = "WINDOW_SIZE";
const ENV_COOLDOWN: &str = "ALERT_COOLDOWN_SEC";
const ENV_MAINTENANCE: &str = "MAINTENANCE_MODE";
const ENV_LOG_FILE: &str = "LOG_FILE";
const ENV_ALERT_TIMEOUT: &str = "ALERT_TIMEOUT_SEC";

pub const DEFAULT_LOG_FILE: &str = "/var/log/nginx/access_json.log";

/// Watcher configuration
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Slack incoming-webhook URL; `None` disables delivery
    pub webhook_url: Option<String>,
    /// Error-rate trigger level in percent
    pub threshold_pct: f64,
    /// Rolling window capacity
    pub window_size: usize,
    /// Minimum spacing between alerts of the same kind
    pub cooldown: Duration,
    /// Suppress all alert emission
    pub maintenance_mode: bool,
    /// Access log to tail
    pub log_file: PathBuf,
    /// Webhook request timeout
    pub alert_timeout: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            threshold_pct: 2.0,
            window_size: 200,
            cooldown: Duration::from_secs(300),
            maintenance_mode: false,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            alert_timeout: Duration::from_secs(5),
        }
    }
}

impl WatcherConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let webhook_url = lookup(ENV_WEBHOOK_URL)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let threshold_pct = match lookup(ENV_THRESHOLD) {
            Some(raw) => {
                let value: f64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::invalid(ENV_THRESHOLD, &raw))?;
                if !value.is_finite() || value < 0.0 {
                    return Err(ConfigError::invalid(ENV_THRESHOLD, &raw));
                }
                value
            }
            None => defaults.threshold_pct,
        };

        let window_size = match lookup(ENV_WINDOW_SIZE) {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::invalid(ENV_WINDOW_SIZE, &raw)),
            },
            None => defaults.window_size,
        };

        let cooldown = match lookup(ENV_COOLDOWN) {
            Some(raw) => Duration::from_secs(parse_secs(ENV_COOLDOWN, &raw)?),
            None => defaults.cooldown,
        };

        let alert_timeout = match lookup(ENV_ALERT_TIMEOUT) {
            Some(raw) => match parse_secs(ENV_ALERT_TIMEOUT, &raw)? {
                0 => return Err(ConfigError::invalid(ENV_ALERT_TIMEOUT, &raw)),
                secs => Duration::from_secs(secs),
            },
            None => defaults.alert_timeout,
        };

        // Anything other than "true" keeps maintenance off
        let maintenance_mode = lookup(ENV_MAINTENANCE)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let log_file = lookup(ENV_LOG_FILE)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.log_file);

        Ok(Self {
            webhook_url,
            threshold_pct,
            window_size,
            cooldown,
            maintenance_mode,
            log_file,
            alert_timeout,
        })
    }

    /// Samples required before the error-rate rule is evaluated
    pub fn min_samples(&self) -> usize {
        crate::alerts::detector::min_samples_for(self.window_size)
    }
}

fn parse_secs(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::invalid(key, raw))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str) -> Self {
        ConfigError::Invalid {
            key,
            value: value.to_string(),
        }
    }
}
