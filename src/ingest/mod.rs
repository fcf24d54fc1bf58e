//! Log ingest
//!
//! - [`tail`]: follows the access log file for new lines
//! - [`record`]: decodes each line into a request outcome

pub mod record;
pub mod tail;

pub use record::{decode_line, had_upstream_5xx, RequestOutcome};
pub use tail::{FileTailer, LineSource, TailError, DEFAULT_POLL_INTERVAL};
