use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::{Client, Proxy, StatusCode};
use url::Url;

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::{Error, Result};

const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;
const CONNECT_TIMEOUT_SECS: u64 = 10;

// Rotating User-Agent pool - mimics different browsers for better compatibility
static USER_AGENT_INDEX: AtomicUsize = AtomicUsize::new(0);
const USER_AGENTS: &[&str] = &[
    // Chrome on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Firefox on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
    // Safari on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

/// Get the next User-Agent in rotation
fn next_user_agent() -> &'static str {
    let index = USER_AGENT_INDEX.fetch_add(1, Ordering::Relaxed) % USER_AGENTS.len();
    USER_AGENTS[index]
}

/// HTTP GET for feed documents and article pages.
///
/// Every request is raced against a timer; the losing request future is
/// dropped, which aborts the underlying connection. Redirects (301/302/303/
/// 307/308) are followed up to the configured hop count. Failed requests are
/// never retried here.
#[derive(Clone)]
pub struct FeedFetcher {
    client: Client,
    feed_timeout: Duration,
}

impl FeedFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Self::build_client(config.max_redirects, &config.proxy_url)?;

        Ok(Self {
            client,
            feed_timeout: Duration::from_secs(config.feed_timeout_secs),
        })
    }

    /// Build HTTP client with bounded redirects and optional proxy
    fn build_client(max_redirects: usize, proxy_url: &Option<String>) -> Result<Client> {
        let redirect = Policy::custom(move |attempt| {
            if attempt.previous().len() > max_redirects {
                attempt.error("too many redirects")
            } else if matches!(attempt.status().as_u16(), 301 | 302 | 303 | 307 | 308) {
                attempt.follow()
            } else {
                attempt.stop()
            }
        });

        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(redirect);

        if let Some(ref proxy) = proxy_url {
            let proxy = Proxy::all(proxy)
                .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
            tracing::info!("Using HTTP proxy for fetching");
        }

        builder.build().map_err(Error::Http)
    }

    /// Build browser-like headers for a request
    fn build_headers(user_agent: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "application/rss+xml,application/atom+xml,application/xml;q=0.9,text/html;q=0.8,*/*;q=0.7",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate, br"));
        if let Ok(ua) = HeaderValue::from_str(user_agent) {
            headers.insert(USER_AGENT, ua);
        }
        headers
    }

    /// Fetch a feed document using the configured feed timeout
    pub async fn fetch(&self, url: &str) -> std::result::Result<String, FetchError> {
        self.fetch_with_timeout(url, self.feed_timeout).await
    }

    /// Fetch a URL as text, failing with `Timeout` if the whole exchange
    /// (headers and body) does not finish within `timeout`.
    pub async fn fetch_with_timeout(
        &self,
        url: &str,
        timeout: Duration,
    ) -> std::result::Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!("unsupported scheme: {url}")));
        }

        match tokio::time::timeout(timeout, self.fetch_body(parsed)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!("Request to {} timed out after {:?}", url, timeout);
                Err(FetchError::Timeout(timeout))
            }
        }
    }

    async fn fetch_body(&self, url: Url) -> std::result::Result<String, FetchError> {
        let user_agent = next_user_agent();
        tracing::debug!("GET {} (User-Agent: {})", url, user_agent);

        let response = self
            .client
            .get(url)
            .headers(Self::build_headers(user_agent))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN && Self::is_cloudflare_response(response.headers()) {
            return Err(FetchError::Blocked);
        }
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        if let Some(len) = response.content_length() {
            Self::ensure_content_size(len as usize)?;
        }

        let body: Bytes = response.bytes().await?;
        Self::ensure_content_size(body.len())?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(FetchError::EmptyResponse);
        }
        if Self::is_challenge_page(&body) {
            return Err(FetchError::Blocked);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    fn is_cloudflare_response(headers: &HeaderMap) -> bool {
        headers.get("cf-mitigated").is_some()
            || headers
                .get("server")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.contains("cloudflare"))
                .unwrap_or(false)
    }

    /// Check if content is a Cloudflare challenge page
    fn is_challenge_page(content: &[u8]) -> bool {
        // Check first 2KB for Cloudflare markers
        let check_len = content.len().min(2048);
        let preview = String::from_utf8_lossy(&content[..check_len]);

        preview.contains("Just a moment...")
            || preview.contains("cf-browser-verification")
            || preview.contains("_cf_chl_opt")
            || preview.contains("challenge-platform")
    }

    fn ensure_content_size(size: usize) -> std::result::Result<(), FetchError> {
        if size > MAX_BODY_BYTES {
            return Err(FetchError::TooLarge(size));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_rotation() {
        // Reset counter for deterministic test
        USER_AGENT_INDEX.store(0, Ordering::Relaxed);

        let ua1 = next_user_agent();
        let ua2 = next_user_agent();
        let ua3 = next_user_agent();

        assert!(ua1.contains("Chrome") && ua1.contains("Macintosh"));
        assert!(ua2.contains("Chrome") && ua2.contains("Windows"));
        assert!(ua3.contains("Firefox"));
    }

    #[test]
    fn test_challenge_page_detection() {
        assert!(FeedFetcher::is_challenge_page(b"<html><title>Just a moment...</title>"));
        assert!(!FeedFetcher::is_challenge_page(b"<rss><channel></channel></rss>"));
    }

    #[tokio::test]
    async fn test_rejects_non_http_urls() {
        let fetcher = FeedFetcher::new(&FetchConfig::default()).unwrap();

        let result = fetcher.fetch("ftp://example.com/feed.xml").await;
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));

        let result = fetcher.fetch("not a url").await;
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }
}
