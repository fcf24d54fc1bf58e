//! Access log record decoding
//!
//! Turns one JSON access log line into a [`RequestOutcome`]. Lines that are
//! not JSON objects are discarded; missing fields default to empty values.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Outcome of one proxied request, as logged by nginx
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOutcome {
    /// Lowercased backend pool label (blue/green)
    pub pool: Option<String>,
    /// Release label of the serving backend
    pub release: String,
    /// Status returned to the client
    pub final_status: String,
    /// Raw upstream status field, one code per attempt
    pub upstream_status: String,
    /// Backend that ultimately served the request
    pub upstream_addr: String,
    /// Request processing time as logged
    pub request_time: String,
}

impl RequestOutcome {
    /// Whether any upstream attempt for this request returned a 5xx
    pub fn had_upstream_5xx(&self) -> bool {
        had_upstream_5xx(&self.upstream_status)
    }
}

/// Decode a single log line, returning `None` for anything malformed
pub fn decode_line(line: &str) -> Option<RequestOutcome> {
    let value: Value = serde_json::from_str(line.trim()).ok()?;
    let obj = value.as_object()?;

    let pool = field(obj, "pool").to_lowercase();

    Some(RequestOutcome {
        pool: if pool.is_empty() { None } else { Some(pool) },
        release: field(obj, "release"),
        final_status: field(obj, "status"),
        upstream_status: field(obj, "upstream_status"),
        upstream_addr: field(obj, "upstream_addr"),
        request_time: field(obj, "request_time"),
    })
}

/// Check a delimited upstream status list for a server error
///
/// nginx logs retries as `"502, 200"` or `"502 : 200"`; each token is
/// classified on its own.
pub fn had_upstream_5xx(upstream_status: &str) -> bool {
    upstream_status
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|tok| !tok.is_empty())
        .any(|tok| five_xx().is_match(tok))
}

fn five_xx() -> &'static Regex {
    static FIVE_XX: OnceLock<Regex> = OnceLock::new();
    FIVE_XX.get_or_init(|| Regex::new(r"^5\d\d$").expect("valid 5xx pattern"))
}

/// Render a field as a string; null and missing become empty
fn field(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
