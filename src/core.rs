use std::io::Read;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tokio::time::sleep;
use url::Url;

use super::config::SessionConfig;
use super::error::{HistoryError, Result};

/// Environment variable holding the scrapfly.io API key. When set, every
/// fetch is routed through the proxy instead of hitting the origin directly.
pub const PROXY_KEY_ENV: &str = "SCRAPFLE_APIKEY";

const PROXY_API_URL: &str = "https://api.scrapfly.io/scrape";
const PROXY_COUNTRIES: &str = "us,ca,mx,gb,fr,de,au,at,be,hr,cz,dk,ee,fi,ie,se,es,pt,nl";

/// HTTP session shared by every remote call of a reconstruction run.
///
/// The session wraps a `reqwest::Client` with the retry policy the archive
/// service expects: any 4xx or 5xx response is retried up to `max_retries`
/// times with a fixed pause in between, and after the retries are exhausted
/// the last response is returned as-is so the caller can inspect it.
///
/// # Proxy indirection
///
/// When [`PROXY_KEY_ENV`] is present in the environment, [`fetch_page`]
/// issues the GET against the proxy endpoint with the real URL embedded as a
/// parameter and unwraps the JSON envelope. Proxy results above 399 fail with
/// [`HistoryError::FetchTransport`]; 3xx results fail with the distinct
/// [`HistoryError::FetchRedirect`] so callers can tell the two apart.
///
/// [`fetch_page`]: HttpSession::fetch_page
#[derive(Debug)]
pub struct HttpSession {
    client: reqwest::Client,
    max_retries: u32,
    retry_sleep: std::time::Duration,
}

#[derive(Debug, Deserialize)]
struct ProxyEnvelope {
    result: ProxyResult,
}

#[derive(Debug, Deserialize)]
struct ProxyResult {
    status_code: u16,
    #[serde(default)]
    status: String,
    #[serde(default)]
    content: String,
}

impl HttpSession {
    /// Creates a session from the given configuration.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| HistoryError::ParseArgument(format!("user agent: {e}")))?,
        );

        let redirect = if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        };

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(redirect)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
            retry_sleep: config.retry_sleep,
        })
    }

    /// Overrides the retry count, e.g. with the value stored per feed.
    pub fn set_max_retries(&mut self, max_retries: u32) {
        self.max_retries = max_retries;
    }

    /// Issues a GET, retrying 4xx/5xx responses.
    ///
    /// Network-level failures propagate immediately. After `max_retries`
    /// status failures the last response is returned unchanged.
    pub async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let mut retries = 0;

        loop {
            let response = self.client.get(url).send().await?;
            let status = response.status();

            if status.is_client_error() || status.is_server_error() {
                if retries < self.max_retries {
                    retries += 1;
                    tracing::info!(
                        "HTTP status code {} for `{}`, retrying {}/{}",
                        status.as_u16(),
                        url,
                        retries,
                        self.max_retries
                    );
                    sleep(self.retry_sleep).await;
                    continue;
                }
                tracing::warn!("maximum retries reached for `{url}`");
            }

            return Ok(response);
        }
    }

    /// Fetches a page as bytes, via the proxy when a key is configured.
    ///
    /// On the direct path a terminal non-2xx becomes
    /// [`HistoryError::FetchTransport`]. Successful direct bodies are run
    /// through an opportunistic Brotli decode: the archive service sometimes
    /// returns `br` payloads without the matching content-encoding header, in
    /// which case transparent client decoding never kicks in.
    pub async fn fetch_page(&self, url: &str) -> Result<Vec<u8>> {
        if let Ok(key) = std::env::var(PROXY_KEY_ENV) {
            if !key.is_empty() {
                return self.fetch_via_proxy(&key, url).await;
            }
        }

        tracing::info!("Fetching `{url}`");
        let response = self.get(url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HistoryError::FetchTransport {
                url: url.to_string(),
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let body = response.bytes().await?.to_vec();
        Ok(decode_brotli(&body).unwrap_or(body))
    }

    async fn fetch_via_proxy(&self, key: &str, url: &str) -> Result<Vec<u8>> {
        tracing::info!("Fetching `{url}` via scrapfly.io");
        let request_url = Url::parse_with_params(
            PROXY_API_URL,
            &[("key", key), ("url", url), ("country", PROXY_COUNTRIES)],
        )?;

        let response = self.get(request_url.as_str()).await?;
        let envelope: ProxyEnvelope = response.json().await?;
        let result = envelope.result;

        if result.status_code > 399 {
            return Err(HistoryError::FetchTransport {
                url: url.to_string(),
                status: result.status_code,
                reason: result.status,
            });
        }
        if result.status_code > 299 {
            return Err(HistoryError::FetchRedirect {
                url: url.to_string(),
                status: result.status_code,
                reason: result.status,
            });
        }

        Ok(result.content.into_bytes())
    }
}

/// Attempts a Brotli decode of `bytes`, returning `None` when the payload is
/// not a valid Brotli stream.
fn decode_brotli(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut decoded = Vec::new();
    let mut reader = brotli::Decompressor::new(bytes, 4096);
    match reader.read_to_end(&mut decoded) {
        Ok(n) if n > 0 => Some(decoded),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_decode_brotli_roundtrip() {
        let payload = b"<rss version=\"2.0\"><channel></channel></rss>";
        let mut compressed = Vec::new();
        {
            let mut writer = brotli::CompressorWriter::new(&mut compressed, 4096, 5, 22);
            writer.write_all(payload).unwrap();
        }

        let decoded = decode_brotli(&compressed).expect("valid brotli stream");
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_decode_brotli_passthrough() {
        // Plain XML is not a Brotli stream; the caller keeps the raw body.
        assert!(decode_brotli(b"<rss></rss>").is_none());
        assert!(decode_brotli(b"").is_none());
    }
}
