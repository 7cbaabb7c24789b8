//! Full-text enrichment of newly discovered posts.

use std::collections::HashMap;
use std::time::Duration;

use governor::{Quota, RateLimiter};

use crate::core::HttpSession;
use crate::error::Result;
use crate::extract::extract_article;
use crate::parsing::feed::FeedEntry;

/// Fetches each new post's article and replaces its body with the distilled
/// readable content. Returns how many posts were enriched.
///
/// Requests are paced to at most one per `sleep_seconds` via a token-bucket
/// limiter. A failure for one article logs a warning and leaves that entry
/// with whatever body it already had; it never aborts the run.
pub async fn enrich_entries(
    session: &HttpSession,
    entries: &mut HashMap<String, FeedEntry>,
    links: &[String],
    sleep_seconds: f64,
) -> usize {
    let limiter = (sleep_seconds > 0.0)
        .then(|| Quota::with_period(Duration::from_secs_f64(sleep_seconds)))
        .flatten()
        .map(|quota| RateLimiter::direct(quota));

    let mut enriched = 0;
    for link in links {
        let Some(entry) = entries.get_mut(link) else {
            continue;
        };

        if let Some(limiter) = &limiter {
            limiter.until_ready().await;
        }

        match full_text(session, link).await {
            Ok(html) => {
                entry.description = Some(html);
                enriched += 1;
            }
            Err(err) => {
                tracing::warn!("failed to process `{link}` into full text: {err}");
            }
        }
    }

    enriched
}

async fn full_text(session: &HttpSession, link: &str) -> Result<String> {
    let page = session.fetch_page(link).await?;
    extract_article(&page, link)
}
