mod common;

use std::collections::BTreeMap;

use common::read_fixture;
use history4feed::{FeedEntry, build_feed, parse_feed};

const RSS_FIXTURE: &str = "rss/blog.xml";

fn merged_entries() -> (history4feed::ChannelMeta, Vec<FeedEntry>) {
    let feed = parse_feed(&read_fixture(RSS_FIXTURE)).unwrap();
    let entries = feed.entries_by_link("feed-1").into_values().collect();
    (feed.meta, entries)
}

#[test]
fn test_items_ordered_by_pub_date_descending() {
    let (meta, entries) = merged_entries();
    let xml = build_feed(&meta, &BTreeMap::new(), &entries, false).unwrap();
    let reparsed = parse_feed(xml.as_bytes()).unwrap();

    let dates: Vec<_> = reparsed.entries.iter().map(|e| e.created).collect();
    assert_eq!(dates.len(), 3);
    assert!(dates.windows(2).all(|pair| pair[0] >= pair[1]));
    assert_eq!(reparsed.entries[0].link, "https://blog.example.com/fourth");
    assert_eq!(reparsed.entries[2].link, "https://blog.example.com/second");
}

#[test]
fn test_round_trip_preserves_entry_tuples() {
    let (meta, entries) = merged_entries();
    let xml = build_feed(&meta, &BTreeMap::new(), &entries, false).unwrap();
    let reparsed = parse_feed(xml.as_bytes()).unwrap();

    let tuple = |e: &FeedEntry| {
        (
            e.link.clone(),
            e.title.clone(),
            e.created,
            e.author.clone(),
            e.categories.clone(),
        )
    };
    let mut expected: Vec<_> = entries.iter().map(tuple).collect();
    expected.sort();

    let mut actual: Vec<_> = reparsed
        .entries_by_link("feed-1")
        .into_values()
        .map(|e| tuple(&e))
        .collect();
    actual.sort();

    assert_eq!(actual, expected);
}

#[test]
fn test_round_trip_preserves_enriched_body() {
    let (meta, mut entries) = merged_entries();
    for entry in &mut entries {
        entry.description = Some(format!("<article>{}</article>", entry.title));
    }
    let xml = build_feed(&meta, &BTreeMap::new(), &entries, false).unwrap();
    let reparsed = parse_feed(xml.as_bytes()).unwrap();

    for entry in &reparsed.entries {
        assert_eq!(
            entry.description.as_deref(),
            Some(format!("<article>{}</article>", entry.title).as_str())
        );
    }
}

#[test]
fn test_window_boundaries() {
    use chrono::NaiveDate;
    use history4feed::within_window;

    let (_, entries) = merged_entries();
    let earliest = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
    let kept: Vec<_> = entries
        .iter()
        .filter(|e| within_window(e.created.date_naive(), Some(earliest), None))
        .collect();

    assert_eq!(kept.len(), 2);
    assert!(kept.iter().all(|e| e.created.date_naive() >= earliest));
}
