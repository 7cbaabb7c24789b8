//! Configuration for the HTTP session used by every remote call.
//!
//! Most callers can rely on [`SessionConfig::default`]; the pipeline overrides
//! `follow_redirects` (archive snapshot URLs redirect between capture
//! timestamps) and overlays the per-feed retry count loaded from the store.

use std::time::Duration;

/// Default user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("history4feed/", env!("CARGO_PKG_VERSION"));

/// Default lower window bound when `--earliest-entry` is not given.
pub const DEFAULT_EARLIEST_ENTRY: &str = "2000-01-01";

/// Settings for [`HttpSession`](crate::HttpSession).
///
/// `max_retries` and `retry_sleep` drive the 4xx/5xx retry loop; after the
/// retries are exhausted the last response is handed back to the caller
/// unchanged rather than turned into an error, so the caller can decide what a
/// terminal non-2xx means for its operation.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// User agent string for HTTP requests.
    pub user_agent: String,

    /// Whether to follow HTTP redirects.
    pub follow_redirects: bool,

    /// How many times a 4xx/5xx response is retried (default: 3).
    pub max_retries: u32,

    /// Pause between retries (default: 1s).
    pub retry_sleep: Duration,

    /// HTTP request timeout duration.
    pub timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            follow_redirects: false,
            max_retries: 3,
            retry_sleep: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}
