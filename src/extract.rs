//! Readable-content extraction for article pages.

use std::io::Cursor;

use url::Url;

use crate::error::{HistoryError, Result};

/// Distills the main readable body out of a fetched article page.
///
/// Applies the readability scoring pass (text density vs. link density over
/// candidate block containers) and returns the winning subtree's inner HTML.
/// Anything that prevents a usable fragment (an unparseable URL, extractor
/// failure, or an empty product) surfaces as
/// [`HistoryError::ExtractionFailed`] so callers can tell it apart from
/// transport errors.
pub fn extract_article(body: &[u8], link: &str) -> Result<String> {
    let url = Url::parse(link)
        .map_err(|e| HistoryError::ExtractionFailed(format!("bad article URL `{link}`: {e}")))?;

    let mut cursor = Cursor::new(body);
    let product = readability::extractor::extract(&mut cursor, &url)
        .map_err(|e| HistoryError::ExtractionFailed(format!("`{link}`: {e:?}")))?;

    if product.content.trim().is_empty() {
        return Err(HistoryError::ExtractionFailed(format!(
            "`{link}`: no usable content"
        )));
    }

    Ok(product.content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_main_body() {
        let page = br#"<html><head><title>t</title></head><body>
<nav><a href="/a">a</a><a href="/b">b</a><a href="/c">c</a></nav>
<article><p>This is the long readable body of the article. It goes on for a
while so the scorer has something to prefer over the navigation links. And a
little more text to be safe.</p></article>
</body></html>"#;
        let html = extract_article(page, "https://example.com/post").unwrap();
        assert!(html.contains("readable body"));
    }

    #[test]
    fn test_bad_url_is_extraction_failure() {
        let err = extract_article(b"<html></html>", "not a url").unwrap_err();
        assert!(matches!(err, HistoryError::ExtractionFailed(_)));
    }
}
