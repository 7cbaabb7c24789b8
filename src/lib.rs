//! # history4feed: reconstruct the full history of a web feed
//!
//! Most blogs only expose their most recent posts on the live RSS or Atom
//! feed. This crate rebuilds the complete post archive of a feed URL by
//! mining the Wayback Machine for every unique capture of the feed, merging
//! the historical entries with the live feed and with everything persisted
//! by earlier runs, and enriching each new post with the article's full
//! readable body fetched from the origin site. The merged archive is
//! synthesized into a single RSS 2.0 document and stored in a local SQLite
//! file, so subsequent runs extend the archive incrementally instead of
//! recomputing it.
//!
//! ## Pipeline
//!
//! 1. Validate the live feed (`parse_feed`)
//! 2. Enumerate unique archive captures inside the date window (`wayback`)
//! 3. Fetch and parse every capture; merge with the live and stored entries
//!    (`merge`)
//! 4. Convert new posts to full text (`enrich`)
//! 5. Synthesize the canonical feed (`parsing::output`) and persist it
//!    (`store`)
//!
//! All remote I/O goes through one [`HttpSession`] with retry, optional
//! proxy indirection, and opportunistic Brotli decoding.

mod config;
mod core;
mod enrich;
mod error;
mod extract;
pub mod logging;
mod merge;
pub mod parsing;
mod pipeline;
mod store;
mod wayback;

pub use config::{DEFAULT_EARLIEST_ENTRY, DEFAULT_USER_AGENT, SessionConfig};
pub use core::{HttpSession, PROXY_KEY_ENV};
pub use enrich::enrich_entries;
pub use error::{HistoryError, Result};
pub use extract::extract_article;
pub use merge::{MergeOutcome, merge_entries, within_window};
pub use parsing::feed::{ChannelMeta, FeedEntry, FeedKind, ParsedEntry, ParsedFeed, parse_feed};
pub use parsing::output::{GENERATOR, build_feed};
pub use pipeline::{ReconstructOptions, reconstruct_feed, update_all};
pub use store::{BlogMeta, DEFAULT_DB_PATH, FeedListRow, FeedSettings, Store};
pub use wayback::{Capture, discover_captures};

/// Current crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
