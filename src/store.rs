//! SQLite persistence for feeds, blogs, and posts.
//!
//! A single-file store with three tables. `feed` holds the reconstruction
//! settings for a target URL, `blog` the rendered view produced by the last
//! successful run (1:1 with `feed`, same id), and `post` the individual
//! entries. Deleting a feed cascades through its blog and posts; foreign
//! keys are switched on per connection to make that hold.
//!
//! Timestamps are stored as ISO-8601 text and parsed back permissively.
//! The store is single-writer: the pipeline is serial and no other process
//! touches the file.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};

use crate::error::Result;
use crate::parsing::feed::{FeedEntry, FeedKind};
use crate::parsing::utils::parse_datetime;

/// Default store filename, created in the working directory.
pub const DEFAULT_DB_PATH: &str = "history4feed.sqlite";

const SCHEMA: &str = include_str!("schema.sql");

/// Reconstruction settings for one target URL, as stored in the `feed` table.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub id: String,
    pub url: String,
    pub retries: u32,
    pub sleep_seconds: f64,
    pub earliest_entry: Option<String>,
    pub latest_entry: Option<String>,
    pub ignore_live_feed_entries: bool,
    pub pretty: bool,
    pub created: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
}

/// The rendered view of a feed, as stored in the `blog` table.
///
/// `earliest_post`, `latest_post`, and `full_rss` are all `None` for a
/// run that produced no posts inside the window.
#[derive(Debug, Clone)]
pub struct BlogMeta {
    pub title: String,
    pub description: String,
    pub url: String,
    pub earliest_post: Option<DateTime<Utc>>,
    pub latest_post: Option<DateTime<Utc>>,
    pub full_rss: Option<String>,
}

/// One row of the feed listing (`feed` joined with `blog`).
#[derive(Debug, Clone)]
pub struct FeedListRow {
    pub feed_id: String,
    pub kind: String,
    pub url: String,
    pub last_run: Option<String>,
    pub earliest_post: Option<String>,
    pub latest_post: Option<String>,
    pub ignore_live_feed_entries: bool,
    pub earliest_entry: Option<String>,
    pub latest_entry: Option<String>,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens the store, creating the schema when absent. Idempotent.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Returns the feed row for `url`, or `None`.
    pub fn feed_by_url(&self, url: &str) -> Result<Option<FeedSettings>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, url, retries, sleep_seconds, earliest_entry, latest_entry,
                    ignore_live_feed_entries, pretty, created, last_run
             FROM feed WHERE url = ?1",
        )?;
        let mut rows = stmt.query(params![url])?;
        match rows.next()? {
            Some(row) => Ok(Some(feed_settings_from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Inserts a new feed row. `created` and `last_run` are stamped with the
    /// current time; the URL uniqueness constraint rejects duplicates.
    pub fn add_feed(&self, settings: &FeedSettings, kind: FeedKind) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO feed (id, type, url, created, last_run, retries, sleep_seconds,
                               earliest_entry, latest_entry, ignore_live_feed_entries, pretty)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                settings.id,
                kind.as_str(),
                settings.url,
                now,
                now,
                settings.retries,
                settings.sleep_seconds,
                settings.earliest_entry,
                settings.latest_entry,
                settings.ignore_live_feed_entries,
                settings.pretty,
            ],
        )?;
        Ok(())
    }

    /// Inserts or replaces the blog row and bumps the owning feed's
    /// `last_run`.
    pub fn add_blog(&self, blog: &BlogMeta, feed_id: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO blog (id, title, description, url, latest_post,
                                          earliest_post, full_rss)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                feed_id,
                blog.title,
                blog.description,
                blog.url,
                blog.latest_post.map(|d| d.to_rfc3339()),
                blog.earliest_post.map(|d| d.to_rfc3339()),
                blog.full_rss,
            ],
        )?;
        self.conn.execute(
            "UPDATE feed SET last_run = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), feed_id],
        )?;
        Ok(())
    }

    /// Deletes the feed for `url`; the blog and posts cascade. Returns how
    /// many feed rows were removed.
    pub fn delete_feed_by_url(&self, url: &str) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM feed WHERE url = ?1", params![url])?)
    }

    /// Batch insert-or-replace of posts, keyed by their opaque id.
    pub fn add_posts(&self, posts: &[FeedEntry]) -> Result<()> {
        let mut stmt = self.conn.prepare(
            "INSERT OR REPLACE INTO post (id, blog_id, title, link, author, created,
                                          added, categories, description, raw_xml)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for post in posts {
            stmt.execute(params![
                post.id,
                post.blog_id,
                post.title,
                post.link,
                post.author,
                post.created.to_rfc3339(),
                post.added.to_rfc3339(),
                serde_json::to_string(&post.categories)?,
                post.description,
                post.raw_xml,
            ])?;
        }
        Ok(())
    }

    /// All posts belonging to a blog.
    pub fn posts_by_blog(&self, blog_id: &str) -> Result<Vec<FeedEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, blog_id, title, link, author, created, added, categories,
                    description, raw_xml
             FROM post WHERE blog_id = ?1",
        )?;
        let mut posts = Vec::new();
        let mut rows = stmt.query(params![blog_id])?;
        while let Some(row) = rows.next()? {
            if let Some(post) = post_from_row(row)? {
                posts.push(post);
            }
        }
        Ok(posts)
    }

    /// The blog's latest post timestamp and full serialized document.
    pub fn blog(&self, blog_id: &str) -> Result<Option<(Option<DateTime<Utc>>, Option<String>)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT latest_post, full_rss FROM blog WHERE id = ?1")?;
        let mut rows = stmt.query(params![blog_id])?;
        match rows.next()? {
            Some(row) => {
                let latest: Option<String> = row.get(0)?;
                let full_rss: Option<String> = row.get(1)?;
                let latest = latest.as_deref().and_then(parse_datetime);
                Ok(Some((latest, full_rss)))
            }
            None => Ok(None),
        }
    }

    /// Joined feed + blog rows for the listing and the bulk updater.
    pub fn feed_list(&self) -> Result<Vec<FeedListRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT feed.id, feed.type, feed.url, feed.last_run,
                    blog.earliest_post, blog.latest_post,
                    feed.ignore_live_feed_entries, feed.earliest_entry, feed.latest_entry
             FROM feed INNER JOIN blog ON blog.id = feed.id",
        )?;
        let mut feeds = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            feeds.push(FeedListRow {
                feed_id: row.get(0)?,
                kind: row.get(1)?,
                url: row.get(2)?,
                last_run: row.get(3)?,
                earliest_post: row.get(4)?,
                latest_post: row.get(5)?,
                ignore_live_feed_entries: row.get(6)?,
                earliest_entry: row.get(7)?,
                latest_entry: row.get(8)?,
            });
        }
        Ok(feeds)
    }
}

fn feed_settings_from_row(row: &Row<'_>) -> Result<FeedSettings> {
    let created: Option<String> = row.get(8)?;
    let last_run: Option<String> = row.get(9)?;
    Ok(FeedSettings {
        id: row.get(0)?,
        url: row.get(1)?,
        retries: row.get(2)?,
        sleep_seconds: row.get(3)?,
        earliest_entry: row.get(4)?,
        latest_entry: row.get(5)?,
        ignore_live_feed_entries: row.get(6)?,
        pretty: row.get(7)?,
        created: created.as_deref().and_then(parse_datetime),
        last_run: last_run.as_deref().and_then(parse_datetime),
    })
}

fn post_from_row(row: &Row<'_>) -> Result<Option<FeedEntry>> {
    let link: String = row.get(3)?;
    let created: String = row.get(5)?;
    let added: String = row.get(6)?;
    let categories: Option<String> = row.get(7)?;

    let Some(created) = parse_datetime(&created) else {
        tracing::warn!("skipping post `{link}`: stored created date `{created}` is unreadable");
        return Ok(None);
    };
    let added = parse_datetime(&added).unwrap_or(created);
    let categories = categories
        .as_deref()
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default();

    Ok(Some(FeedEntry {
        id: row.get(0)?,
        blog_id: row.get(1)?,
        title: row.get(2)?,
        link,
        author: row.get(4)?,
        created,
        added,
        categories,
        description: row.get(8)?,
        raw_xml: row.get(9)?,
    }))
}
