//! Error types for history4feed.
//!
//! All fallible operations return `Result<T, HistoryError>`. The variants mirror
//! the failure modes of the pipeline: a URL that is not a feed, transport and
//! redirect failures from direct or proxied fetches, article extraction that
//! produced nothing usable, and conflicts against the local store.
//!
//! Per-item errors (a single archive capture, a single article) are logged and
//! swallowed by the loops that encounter them; per-URL errors abort that URL
//! only; argument errors abort the whole invocation.

use thiserror::Error;

/// Comprehensive error type for all history4feed operations.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// The input bytes did not parse as an RSS or Atom document.
    #[error("not a valid RSS or Atom feed: {0}")]
    UnknownFeedType(String),

    /// A direct fetch exhausted its retries, or the proxy reported >= 400.
    #[error("GET request failed for `{url}`, status: {status}, reason: {reason}")]
    FetchTransport {
        url: String,
        status: u16,
        reason: String,
    },

    /// The proxy reported a 3xx result for the target URL.
    #[error("GET for `{url}` redirected, status: {status}, reason: {reason}")]
    FetchRedirect {
        url: String,
        status: u16,
        reason: String,
    },

    /// The readability pass produced no usable content for an article.
    #[error("full text extraction failed: {0}")]
    ExtractionFailed(String),

    /// A reconstruction was requested for a URL that already has a feed row.
    #[error("conflicting entry for `{0}`")]
    Conflict(String),

    /// A command-line date could not be parsed.
    #[error("unable to parse {0}")]
    ParseArgument(String),

    /// `ignore_live_feed_entries` was set but the archive holds no captures.
    #[error("no archive captures exist for this feed; use the live feed")]
    NoArchive,

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, HistoryError>;
