//! Snapshot discovery against the Wayback Machine capture index.

use serde_json::Value;
use url::Url;

use crate::core::HttpSession;
use crate::error::Result;

/// Wayback Machine CDX API base URL.
pub const CDX_API_URL: &str = "https://web.archive.org/cdx/search/cdx";

/// Base URL snapshots are replayed from.
pub const SNAPSHOT_BASE_URL: &str = "https://web.archive.org/web";

/// One unique capture of a URL held by the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// 14-digit capture timestamp (`YYYYMMDDhhmmss`).
    pub timestamp: String,

    /// HTTP status the archive recorded for the capture; `-` for some
    /// redirect captures. Captures are not filtered by status: a redirect
    /// capture that fails to parse downstream is simply dropped there.
    pub status_code: String,
}

impl Capture {
    /// URL that replays the original, unmodified payload of this capture.
    ///
    /// The `id_` flag asks the archive for the body exactly as captured,
    /// without replay chrome injected.
    pub fn fetch_url(&self, original: &str) -> String {
        format!("{SNAPSHOT_BASE_URL}/{}id_/{original}", self.timestamp)
    }
}

/// Enumerates the unique captures of `url` intersecting `[from, to]`
/// (both `YYYYMMDD`), ordered by capture timestamp ascending.
///
/// Uniqueness is by response content: the index collapses consecutive
/// captures with the same digest.
pub async fn discover_captures(
    session: &HttpSession,
    url: &str,
    from: &str,
    to: &str,
) -> Result<Vec<Capture>> {
    let query_url = Url::parse_with_params(
        CDX_API_URL,
        &[
            ("url", url),
            ("from", from),
            ("to", to),
            ("output", "json"),
            ("collapse", "digest"),
        ],
    )?;

    let body = session.fetch_page(query_url.as_str()).await?;
    parse_cdx_rows(&body)
}

/// Parses the CDX JSON response: an array of rows, the first being the
/// column header.
fn parse_cdx_rows(body: &[u8]) -> Result<Vec<Capture>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let rows: Vec<Vec<Value>> = serde_json::from_slice(body)?;
    let mut rows = rows.into_iter();

    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };
    let column = |name: &str, default: usize| {
        header
            .iter()
            .position(|v| v.as_str() == Some(name))
            .unwrap_or(default)
    };
    let timestamp_idx = column("timestamp", 1);
    let status_idx = column("statuscode", 4);

    let mut captures = Vec::new();
    for row in rows {
        let Some(timestamp) = row.get(timestamp_idx).and_then(Value::as_str) else {
            continue;
        };
        let status_code = row
            .get(status_idx)
            .and_then(Value::as_str)
            .unwrap_or("-")
            .to_string();
        captures.push(Capture {
            timestamp: timestamp.to_string(),
            status_code,
        });
    }

    Ok(captures)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_url_requests_unmodified_payload() {
        let capture = Capture {
            timestamp: "20230601120000".to_string(),
            status_code: "200".to_string(),
        };
        assert_eq!(
            capture.fetch_url("https://example.com/feed/"),
            "https://web.archive.org/web/20230601120000id_/https://example.com/feed/"
        );
    }

    #[test]
    fn test_parse_cdx_rows() {
        let body = br#"[
["urlkey","timestamp","original","mimetype","statuscode","digest","length"],
["com,example)/feed","20230601120000","https://example.com/feed/","text/xml","200","AAAA","1234"],
["com,example)/feed","20230901120000","https://example.com/feed/","text/xml","301","BBBB","88"]
]"#;
        let captures = parse_cdx_rows(body).unwrap();
        assert_eq!(captures.len(), 2);
        assert_eq!(captures[0].timestamp, "20230601120000");
        // redirect captures are retained
        assert_eq!(captures[1].status_code, "301");
    }

    #[test]
    fn test_parse_cdx_empty() {
        assert!(parse_cdx_rows(b"[]").unwrap().is_empty());
    }
}
