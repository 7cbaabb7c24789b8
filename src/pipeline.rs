//! The reconstruction pipeline: per-URL flow and the bulk updater.
//!
//! A reconstruction validates the live feed, enumerates archive captures of
//! the URL inside the date window, merges the three entry sources, enriches
//! whatever is new with full text, synthesizes the canonical document, and
//! persists the result. An update run narrows the window to everything since
//! the blog's latest stored post and overlays the settings saved with the
//! feed.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::config::{DEFAULT_EARLIEST_ENTRY, SessionConfig};
use crate::core::HttpSession;
use crate::enrich::enrich_entries;
use crate::error::{HistoryError, Result};
use crate::merge::{merge_entries, within_window};
use crate::parsing::feed::{FeedEntry, parse_feed};
use crate::parsing::output::build_feed;
use crate::parsing::utils::parse_date;
use crate::store::{BlogMeta, FeedSettings, Store};
use crate::wayback::discover_captures;

/// Reconstruction options taken from the command line. For an existing feed
/// being updated these are ignored in favor of the settings stored with it.
#[derive(Debug, Clone)]
pub struct ReconstructOptions {
    pub earliest_entry: Option<String>,
    pub latest_entry: Option<String>,
    pub ignore_live_feed_entries: bool,
    pub pretty: bool,
    pub retries: u32,
    pub sleep_seconds: f64,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            earliest_entry: Some(DEFAULT_EARLIEST_ENTRY.to_string()),
            latest_entry: None,
            ignore_live_feed_entries: false,
            pretty: false,
            retries: 3,
            sleep_seconds: 2.0,
        }
    }
}

/// Reconstructs the archive of one feed URL over `[from, to]` and persists
/// the outcome.
///
/// With `is_update` set, an existing feed's stored settings replace `opts`,
/// the window is rewritten to start at the blog's latest stored post (or the
/// configured earliest entry when the blog has never been populated) and end
/// today, and the previously synthesized document is merged in as the
/// highest-precedence entry source. Without `is_update`, an existing row for
/// the URL is a [`HistoryError::Conflict`].
pub async fn reconstruct_feed(
    store: &Store,
    url: &str,
    from: NaiveDate,
    to: NaiveDate,
    opts: &ReconstructOptions,
    is_update: bool,
) -> Result<()> {
    let mut session = HttpSession::new(SessionConfig {
        follow_redirects: true,
        ..SessionConfig::default()
    })?;

    // validate the live feed before touching anything else
    let live_bytes = session.fetch_page(url).await?;
    let live = parse_feed(&live_bytes)?;
    let mut namespaces = live.namespaces.clone();

    let existing = store.feed_by_url(url)?;
    if existing.is_some() && !is_update {
        return Err(HistoryError::Conflict(url.to_string()));
    }
    let newly_created = existing.is_none();
    let settings = existing.unwrap_or_else(|| FeedSettings {
        id: Uuid::new_v4().to_string(),
        url: url.to_string(),
        retries: opts.retries,
        sleep_seconds: opts.sleep_seconds,
        earliest_entry: opts.earliest_entry.clone(),
        latest_entry: opts.latest_entry.clone(),
        ignore_live_feed_entries: opts.ignore_live_feed_entries,
        pretty: opts.pretty,
        created: None,
        last_run: None,
    });
    session.set_max_retries(settings.retries);

    let mut from = from;
    let mut to = to;
    let mut stored_entries: HashMap<String, FeedEntry> = HashMap::new();

    if !newly_created {
        match store.blog(&settings.id)? {
            Some((Some(latest_post), Some(stored_xml))) => {
                let stored = parse_feed(stored_xml.as_bytes())?;
                namespaces.extend(stored.namespaces.clone());
                stored_entries = stored.entries_by_link(&settings.id);
                from = latest_post.date_naive();
            }
            _ => {
                from = settings
                    .earliest_entry
                    .as_deref()
                    .and_then(parse_date)
                    .unwrap_or(from);
            }
        }
        to = Utc::now().date_naive();
    }

    let from_compact = from.format("%Y%m%d").to_string();
    let to_compact = to.format("%Y%m%d").to_string();
    let captures = discover_captures(&session, url, &from_compact, &to_compact).await?;
    tracing::info!("{} archived captures of `{url}`", captures.len());

    let mut snapshot_entries: HashMap<String, FeedEntry> = HashMap::new();
    for capture in &captures {
        let snapshot_url = capture.fetch_url(url);
        let parsed = match session.fetch_page(&snapshot_url).await {
            Ok(bytes) => parse_feed(&bytes),
            Err(err) => Err(err),
        };
        match parsed {
            Ok(snapshot) => {
                namespaces.extend(snapshot.namespaces.clone());
                snapshot_entries.extend(snapshot.entries_by_link(&settings.id));
            }
            Err(err) => {
                tracing::warn!(
                    "failed to retrieve archive capture {} from `{snapshot_url}`: {err}",
                    capture.timestamp
                );
            }
        }
    }

    if settings.ignore_live_feed_entries && snapshot_entries.is_empty() {
        return Err(HistoryError::NoArchive);
    }

    let live_entries = live.entries_by_link(&settings.id);
    let outcome = merge_entries(
        snapshot_entries,
        live_entries,
        stored_entries,
        settings.ignore_live_feed_entries,
    );
    let mut merged = outcome.merged;

    // filtering uses the feed's configured window, missing bounds open;
    // `from`/`to` bound only snapshot discovery
    let window_earliest = settings.earliest_entry.as_deref().and_then(parse_date);
    let window_latest = settings.latest_entry.as_deref().and_then(parse_date);

    // only in-window novelty flows to full-text enrichment
    let mut new_links: Vec<String> = outcome
        .new_links
        .into_iter()
        .filter(|link| {
            merged.get(link).is_some_and(|e| {
                within_window(e.created.date_naive(), window_earliest, window_latest)
            })
        })
        .collect();
    new_links.sort_by_key(|link| merged.get(link).map(|e| e.created));

    if new_links.is_empty() {
        tracing::info!("No new posts for `{url}`");
    } else {
        let enriched = enrich_entries(
            &session,
            &mut merged,
            &new_links,
            settings.sleep_seconds,
        )
        .await;
        tracing::info!("Processed {enriched} of {} new posts into full text", new_links.len());
    }

    let final_entries: Vec<FeedEntry> = merged
        .values()
        .filter(|e| within_window(e.created.date_naive(), window_earliest, window_latest))
        .cloned()
        .collect();

    let blog = if final_entries.is_empty() {
        BlogMeta {
            title: live.meta.title.clone(),
            description: live.meta.description.clone(),
            url: live.meta.link.clone(),
            earliest_post: None,
            latest_post: None,
            full_rss: None,
        }
    } else {
        let earliest_post = final_entries.iter().map(|e| e.created).min();
        let latest_post = final_entries.iter().map(|e| e.created).max();
        let full_rss = build_feed(&live.meta, &namespaces, &final_entries, settings.pretty)?;
        BlogMeta {
            title: live.meta.title.clone(),
            description: live.meta.description.clone(),
            url: live.meta.link.clone(),
            earliest_post,
            latest_post,
            full_rss: Some(full_rss),
        }
    };

    let new_posts: Vec<FeedEntry> = new_links
        .iter()
        .filter_map(|link| merged.get(link).cloned())
        .collect();

    if newly_created {
        store.add_feed(&settings, live.kind)?;
    }
    store.add_blog(&blog, &settings.id)?;
    store.add_posts(&new_posts)?;

    Ok(())
}

/// Updates every feed without a configured `latest_entry`; windowed feeds
/// have a user-imposed upper bound and are considered complete. A failing
/// feed is logged and the batch continues.
pub async fn update_all(store: &Store) -> Result<()> {
    let feeds = store.feed_list()?;
    tracing::info!("Updating {} feeds", feeds.len());

    let total = feeds.len();
    for (index, feed) in feeds.iter().enumerate() {
        if feed.latest_entry.is_some() {
            tracing::info!("Skipping #{} of {total}: `{}` has a fixed window", index + 1, feed.url);
            continue;
        }
        tracing::info!("Updating #{} of {total}, url: `{}`", index + 1, feed.url);

        let from = parse_date(DEFAULT_EARLIEST_ENTRY).unwrap_or_default();
        let to = Utc::now().date_naive();
        let opts = ReconstructOptions::default();
        if let Err(err) = reconstruct_feed(store, &feed.url, from, to, &opts, true).await {
            tracing::error!("Update blog failed for `{}`: {err}", feed.url);
        }
    }

    Ok(())
}
