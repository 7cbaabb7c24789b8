//! RSS/Atom feed parsing.
//!
//! The parser works in two passes over the document text. A detection pass
//! finds the `rss` or `feed` element (at the root or one level below it) and
//! collects the namespace prefixes declared there; the extraction pass pulls
//! the channel metadata and one [`ParsedEntry`] per `item`/`entry` element.
//!
//! Entries keep the raw XML of their element alongside the extracted fields,
//! so the store can persist the pre-enrichment serialization. An entry whose
//! publish date cannot be parsed, or that carries no link, is dropped with a
//! warning rather than surfaced as an error.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use uuid::Uuid;

use super::utils::parse_datetime;
use crate::error::{HistoryError, Result};

/// The two wire formats a source feed can arrive in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Rss,
    Atom,
}

impl FeedKind {
    /// Uppercase form used in the persistence store.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::Rss => "RSS",
            FeedKind::Atom => "ATOM",
        }
    }

    /// Case-insensitive parse of the stored form.
    pub fn parse(value: &str) -> Option<FeedKind> {
        match value.to_ascii_lowercase().as_str() {
            "rss" => Some(FeedKind::Rss),
            "atom" => Some(FeedKind::Atom),
            _ => None,
        }
    }
}

impl std::fmt::Display for FeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel-level metadata of a parsed feed.
#[derive(Debug, Clone, Default)]
pub struct ChannelMeta {
    pub title: String,
    pub description: String,
    pub link: String,
}

/// A feed entry as extracted from a single document, before it is assigned
/// to a blog.
#[derive(Debug, Clone)]
pub struct ParsedEntry {
    pub link: String,
    pub title: String,
    pub created: DateTime<Utc>,
    pub author: String,
    pub categories: Vec<String>,
    pub description: Option<String>,
    pub raw_xml: String,
}

/// A fully merged entry record, owned by a blog.
///
/// `id` is opaque: assigned when the entry is first observed and never
/// recomputed. Logical de-duplication during merging uses the link, not the
/// id. `description` holds the body after full-text enrichment; until then it
/// carries the source body element text. `raw_xml` is always the
/// pre-enrichment serialization of the original element.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub id: String,
    pub blog_id: String,
    pub title: String,
    pub link: String,
    pub author: String,
    pub created: DateTime<Utc>,
    pub added: DateTime<Utc>,
    pub categories: Vec<String>,
    pub description: Option<String>,
    pub raw_xml: String,
}

/// Result of parsing one feed document.
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub kind: FeedKind,
    pub meta: ChannelMeta,
    pub namespaces: BTreeMap<String, String>,
    pub entries: Vec<ParsedEntry>,
}

impl ParsedFeed {
    /// Keys the entries by link, assigning fresh identities and the given
    /// owning blog. Later entries overwrite earlier ones under the same link.
    pub fn entries_by_link(&self, blog_id: &str) -> HashMap<String, FeedEntry> {
        let mut map = HashMap::new();
        for entry in &self.entries {
            map.insert(
                entry.link.clone(),
                FeedEntry {
                    id: Uuid::new_v4().to_string(),
                    blog_id: blog_id.to_string(),
                    title: entry.title.clone(),
                    link: entry.link.clone(),
                    author: entry.author.clone(),
                    created: entry.created,
                    added: Utc::now(),
                    categories: entry.categories.clone(),
                    description: entry.description.clone(),
                    raw_xml: entry.raw_xml.clone(),
                },
            );
        }
        map
    }
}

/// Parses a feed document, auto-detecting RSS vs Atom.
pub fn parse_feed(content: &[u8]) -> Result<ParsedFeed> {
    let text = String::from_utf8_lossy(content);
    let (kind, namespaces) = detect(&text)?;
    match kind {
        FeedKind::Rss => parse_rss(&text, namespaces),
        FeedKind::Atom => parse_atom(&text, namespaces),
    }
}

/// Finds the feed element and collects `xmlns:` declarations along the way.
fn detect(content: &str) -> Result<(FeedKind, BTreeMap<String, String>)> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut namespaces = BTreeMap::new();
    let mut at_root = true;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                collect_namespaces(&e, &mut namespaces);
                match e.local_name().as_ref() {
                    b"rss" => return Ok((FeedKind::Rss, namespaces)),
                    b"feed" => return Ok((FeedKind::Atom, namespaces)),
                    _ if at_root => at_root = false,
                    _ => {
                        reader.read_to_end(e.name())?;
                    }
                }
            }
            Event::Empty(e) => collect_namespaces(&e, &mut namespaces),
            Event::End(_) | Event::Eof => {
                return Err(HistoryError::UnknownFeedType(
                    "document has no rss or feed element".to_string(),
                ));
            }
            _ => {}
        }
    }
}

fn collect_namespaces(start: &BytesStart, namespaces: &mut BTreeMap<String, String>) {
    for attr in start.attributes().flatten() {
        if let Some(prefix) = attr.key.as_ref().strip_prefix(b"xmlns:") {
            if let (Ok(prefix), Ok(uri)) = (std::str::from_utf8(prefix), attr.unescape_value()) {
                namespaces.insert(prefix.to_string(), uri.into_owned());
            }
        }
    }
}

fn parse_rss(content: &str, namespaces: BTreeMap<String, String>) -> Result<ParsedFeed> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut meta = ChannelMeta::default();
    let mut entries = Vec::new();
    let mut in_channel = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if !in_channel => {
                if e.name().as_ref() == b"channel" {
                    in_channel = true;
                }
                // keep descending toward the channel element
            }
            Event::Start(e) => match e.name().as_ref() {
                b"title" if meta.title.is_empty() => meta.title = read_text(&mut reader, &e)?,
                b"description" if meta.description.is_empty() => {
                    meta.description = read_text(&mut reader, &e)?;
                }
                b"link" if meta.link.is_empty() => {
                    meta.link = read_text(&mut reader, &e)?.trim().to_string();
                }
                b"item" => {
                    if let Some(entry) = read_entry(&mut reader, &e, content, FeedKind::Rss)? {
                        entries.push(entry);
                    }
                }
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(ParsedFeed {
        kind: FeedKind::Rss,
        meta,
        namespaces,
        entries,
    })
}

fn parse_atom(content: &str, namespaces: BTreeMap<String, String>) -> Result<ParsedFeed> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut meta = ChannelMeta::default();
    let mut entries = Vec::new();
    let mut links = Vec::new();
    let mut in_feed = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if !in_feed => {
                if e.local_name().as_ref() == b"feed" {
                    in_feed = true;
                }
            }
            Event::Start(e) => match e.name().as_ref() {
                b"title" if meta.title.is_empty() => meta.title = read_text(&mut reader, &e)?,
                b"subtitle" | b"description" if meta.description.is_empty() => {
                    meta.description = read_text(&mut reader, &e)?;
                }
                b"entry" => {
                    if let Some(entry) = read_entry(&mut reader, &e, content, FeedKind::Atom)? {
                        entries.push(entry);
                    }
                }
                _ if e.local_name().as_ref() == b"link" => {
                    if let Some(link) = link_attributes(&e) {
                        links.push(link);
                    }
                    reader.read_to_end(e.name())?;
                }
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::Empty(e) if in_feed && e.local_name().as_ref() == b"link" => {
                if let Some(link) = link_attributes(&e) {
                    links.push(link);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    meta.link = primary_link(&links);

    Ok(ParsedFeed {
        kind: FeedKind::Atom,
        meta,
        namespaces,
        entries,
    })
}

/// Captures the raw XML of an `item`/`entry` element and extracts its fields.
///
/// Returns `Ok(None)` when the entry must be dropped (no link, or no
/// parseable publish date).
fn read_entry(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart,
    content: &str,
    kind: FeedKind,
) -> Result<Option<ParsedEntry>> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let start_tag = String::from_utf8_lossy(start).into_owned();
    let span = reader.read_to_end(start.name())?;
    let inner = &content[span.start as usize..span.end as usize];
    let raw_xml = format!("<{start_tag}>{inner}</{name}>");

    parse_entry(inner, kind, raw_xml)
}

fn parse_entry(inner: &str, kind: FeedKind, raw_xml: String) -> Result<Option<ParsedEntry>> {
    let mut reader = Reader::from_str(inner);
    reader.config_mut().trim_text(true);

    let mut title = String::new();
    let mut link = String::new();
    let mut atom_links = Vec::new();
    let mut published: Option<String> = None;
    let mut pub_date: Option<String> = None;
    let mut creator = String::new();
    let mut author_name = String::new();
    let mut categories: Vec<String> = Vec::new();
    let mut body: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"title" if title.is_empty() => title = read_text(&mut reader, &e)?,
                b"link" if kind == FeedKind::Rss => {
                    let text = read_text(&mut reader, &e)?;
                    if link.is_empty() {
                        link = text.trim().to_string();
                    }
                }
                b"link" if kind == FeedKind::Atom => {
                    if let Some(link) = link_attributes(&e) {
                        atom_links.push(link);
                    }
                    reader.read_to_end(e.name())?;
                }
                b"published" if published.is_none() => {
                    published = Some(read_text(&mut reader, &e)?);
                }
                b"pubDate" if pub_date.is_none() => pub_date = Some(read_text(&mut reader, &e)?),
                b"dc:creator" if creator.is_empty() => creator = read_text(&mut reader, &e)?,
                b"author" if author_name.is_empty() => {
                    author_name = read_author(&mut reader)?;
                }
                b"category" => {
                    if let Some(term) = category_term(&e) {
                        push_category(&mut categories, term);
                        reader.read_to_end(e.name())?;
                    } else {
                        let text = read_text(&mut reader, &e)?;
                        push_category(&mut categories, text);
                    }
                }
                b"description" if kind == FeedKind::Rss && body.is_none() => {
                    body = Some(read_text(&mut reader, &e)?);
                }
                b"content" if kind == FeedKind::Atom && body.is_none() => {
                    body = Some(read_text(&mut reader, &e)?);
                }
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"link" if kind == FeedKind::Atom => {
                    if let Some(link) = link_attributes(&e) {
                        atom_links.push(link);
                    }
                }
                b"category" => {
                    if let Some(term) = category_term(&e) {
                        push_category(&mut categories, term);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if kind == FeedKind::Atom {
        link = primary_link(&atom_links);
    }
    if link.is_empty() {
        tracing::warn!("dropping entry `{title}`: no link");
        return Ok(None);
    }

    let date_text = published.or(pub_date).unwrap_or_default();
    let Some(created) = parse_datetime(&date_text) else {
        tracing::warn!("dropping `{link}`: unparseable publish date `{date_text}`");
        return Ok(None);
    };

    let author = if creator.is_empty() { author_name } else { creator };

    Ok(Some(ParsedEntry {
        link,
        title,
        created,
        author: author.trim().to_string(),
        categories,
        description: body,
        raw_xml,
    }))
}

/// Accumulates text and CDATA until the current element closes.
fn read_text(reader: &mut Reader<&[u8]>, _start: &BytesStart) -> Result<String> {
    let mut text = String::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Text(t) => text.push_str(&t.unescape()?),
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text)
}

/// Reads the `name` child of an `author` element; other children are skipped.
fn read_author(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut name = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if e.name().as_ref() == b"name" && name.is_empty() {
                    name = read_text(reader, &e)?;
                } else {
                    reader.read_to_end(e.name())?;
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }

    Ok(name)
}

fn link_attributes(start: &BytesStart) -> Option<(Option<String>, String)> {
    let mut rel = None;
    let mut href = None;

    for attr in start.attributes().flatten() {
        match attr.key.as_ref() {
            b"rel" => rel = attr.unescape_value().ok().map(|v| v.into_owned()),
            b"href" => href = attr.unescape_value().ok().map(|v| v.into_owned()),
            _ => {}
        }
    }

    href.map(|href| (rel, href))
}

/// The `rel="alternate"` link wins; otherwise the first link.
fn primary_link(links: &[(Option<String>, String)]) -> String {
    links
        .iter()
        .find(|(rel, _)| rel.as_deref() == Some("alternate"))
        .or_else(|| links.first())
        .map(|(_, href)| href.clone())
        .unwrap_or_default()
}

fn category_term(start: &BytesStart) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == b"term")
        .and_then(|attr| attr.unescape_value().ok())
        .map(|v| v.into_owned())
}

fn push_category(categories: &mut Vec<String>, category: String) {
    let category = category.trim().to_string();
    if !category.is_empty() && !categories.contains(&category) {
        categories.push(category);
    }
}
