//! Canonical RSS 2.0 output synthesis.
//!
//! The output document is rebuilt from the merged entry records rather than
//! by splicing parsed subtrees: one `item` per entry, in descending publish
//! order, with the enriched body wrapped in a CDATA section.

use std::collections::BTreeMap;
use std::io::Write;

use chrono::Utc;
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use super::feed::{ChannelMeta, FeedEntry};
use crate::error::Result;

/// Value of the `generator` element in synthesized feeds.
pub const GENERATOR: &str = "https://github.com/signalscorps/history4feed";

/// Builds the canonical RSS 2.0 document for the merged entries.
///
/// Items are emitted in descending `created` order regardless of the order
/// the entries were fetched or merged in. `namespaces` is the prefix map
/// collected from every parsed source document and is re-declared on the
/// output root so the raw entry XML kept in the store stays resolvable.
pub fn build_feed(
    meta: &ChannelMeta,
    namespaces: &BTreeMap<String, String>,
    entries: &[FeedEntry],
    pretty: bool,
) -> Result<String> {
    let mut ordered: Vec<&FeedEntry> = entries.iter().collect();
    ordered.sort_by(|a, b| b.created.cmp(&a.created));

    let mut buf = Vec::new();
    if pretty {
        let mut writer = Writer::new_with_indent(&mut buf, b' ', 2);
        write_document(&mut writer, meta, namespaces, &ordered)?;
    } else {
        let mut writer = Writer::new(&mut buf);
        write_document(&mut writer, meta, namespaces, &ordered)?;
    }

    Ok(String::from_utf8(buf)?)
}

fn write_document<W: Write>(
    writer: &mut Writer<W>,
    meta: &ChannelMeta,
    namespaces: &BTreeMap<String, String>,
    entries: &[&FeedEntry],
) -> Result<()> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    for (prefix, uri) in namespaces {
        rss.push_attribute((format!("xmlns:{prefix}").as_str(), uri.as_str()));
    }
    writer.write_event(Event::Start(rss))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;

    write_text_element(writer, "title", &meta.title)?;
    write_text_element(writer, "description", &meta.description)?;
    write_text_element(writer, "link", &meta.link)?;
    write_text_element(writer, "lastBuildDate", &Utc::now().to_rfc3339())?;
    write_text_element(writer, "generator", GENERATOR)?;

    for entry in entries {
        write_item(writer, entry)?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;
    Ok(())
}

fn write_item<W: Write>(writer: &mut Writer<W>, entry: &FeedEntry) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("item")))?;

    write_text_element(writer, "title", &entry.title)?;

    // link goes out as both element text and an href attribute
    writer
        .create_element("link")
        .with_attribute(("href", entry.link.as_str()))
        .write_text_content(BytesText::new(&entry.link))?;

    write_text_element(writer, "pubDate", &entry.created.to_rfc3339())?;

    writer
        .create_element("description")
        .with_attribute(("type", "html"))
        .write_cdata_content(BytesCData::new(
            entry.description.as_deref().unwrap_or_default(),
        ))?;

    for category in &entry.categories {
        write_text_element(writer, "category", category)?;
    }

    if !entry.author.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("author")))?;
        write_text_element(writer, "name", &entry.author)?;
        writer.write_event(Event::End(BytesEnd::new("author")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("item")))?;
    Ok(())
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(link: &str, day: u32) -> FeedEntry {
        FeedEntry {
            id: format!("id-{day}"),
            blog_id: "blog".to_string(),
            title: format!("Post {day}"),
            link: link.to_string(),
            author: "Jane".to_string(),
            created: Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
            added: Utc::now(),
            categories: vec!["tech".to_string()],
            description: Some("<p>Body</p>".to_string()),
            raw_xml: String::new(),
        }
    }

    fn meta() -> ChannelMeta {
        ChannelMeta {
            title: "Blog".to_string(),
            description: "About".to_string(),
            link: "https://example.com/".to_string(),
        }
    }

    #[test]
    fn test_items_ordered_descending() {
        let entries = vec![
            entry("https://example.com/a", 2),
            entry("https://example.com/c", 4),
            entry("https://example.com/b", 3),
        ];
        let xml = build_feed(&meta(), &BTreeMap::new(), &entries, false).unwrap();

        let a = xml.find("https://example.com/a").unwrap();
        let b = xml.find("https://example.com/b").unwrap();
        let c = xml.find("https://example.com/c").unwrap();
        assert!(c < b && b < a);
    }

    #[test]
    fn test_item_shape() {
        let entries = vec![entry("https://example.com/a", 2)];
        let xml = build_feed(&meta(), &BTreeMap::new(), &entries, false).unwrap();

        assert!(xml.contains(r#"<rss version="2.0">"#));
        assert!(xml.contains(r#"<link href="https://example.com/a">https://example.com/a</link>"#));
        assert!(xml.contains("<![CDATA[<p>Body</p>]]>"));
        assert!(xml.contains("<author><name>Jane</name></author>"));
        assert!(xml.contains("<category>tech</category>"));
        assert!(xml.contains(&format!("<generator>{GENERATOR}</generator>")));
    }

    #[test]
    fn test_namespaces_declared_on_root() {
        let mut namespaces = BTreeMap::new();
        namespaces.insert(
            "dc".to_string(),
            "http://purl.org/dc/elements/1.1/".to_string(),
        );
        let xml = build_feed(&meta(), &namespaces, &[], false).unwrap();
        assert!(xml.contains(r#"xmlns:dc="http://purl.org/dc/elements/1.1/""#));
    }

    #[test]
    fn test_author_omitted_when_empty() {
        let mut e = entry("https://example.com/a", 2);
        e.author = String::new();
        let xml = build_feed(&meta(), &BTreeMap::new(), &[e], false).unwrap();
        assert!(!xml.contains("<author>"));
    }

    #[test]
    fn test_pretty_output_indented() {
        let entries = vec![entry("https://example.com/a", 2)];
        let xml = build_feed(&meta(), &BTreeMap::new(), &entries, true).unwrap();
        assert!(xml.contains("\n  <channel>"));
    }
}
