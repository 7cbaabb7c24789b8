use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Datetime formats tried after RFC 2822 and RFC 3339 fail.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d %b %Y %H:%M:%S",
    "%a, %d %b %Y %H:%M:%S",
];

/// Date-only formats, interpreted as midnight UTC.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d", "%d %b %Y", "%B %d, %Y"];

/// Permissive datetime parser for the wide variety of publish dates found in
/// real-world feeds. Offsets are normalized to UTC; formats without an offset
/// are assumed to already be UTC.
pub fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    parse_date(value).map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

/// Permissive date parser used for window bounds and stored date columns.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }
    parse_prefix_datetime(value)
}

// Date columns written by earlier runs hold a full ISO timestamp.
fn parse_prefix_datetime(value: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.date_naive())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc2822_pub_date() {
        let parsed = parse_datetime("Tue, 02 Jan 2024 10:30:00 GMT").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-01-02T10:30:00+00:00");
    }

    #[test]
    fn test_rfc3339_published() {
        let parsed = parse_datetime("2024-01-02T10:30:00+02:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-01-02T08:30:00+00:00");
    }

    #[test]
    fn test_naive_and_date_only() {
        assert!(parse_datetime("2024-01-02T10:30:00").is_some());
        assert!(parse_datetime("2024-01-02").is_some());
        assert!(parse_datetime("January 2, 2024").is_some());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(parse_datetime("not a date").is_none());
        assert!(parse_datetime("").is_none());
    }

    #[test]
    fn test_date_variants() {
        assert_eq!(
            parse_date("20240102"),
            NaiveDate::from_ymd_opt(2024, 1, 2)
        );
        assert_eq!(
            parse_date("2024-01-02T10:30:00+00:00"),
            NaiveDate::from_ymd_opt(2024, 1, 2)
        );
    }
}
