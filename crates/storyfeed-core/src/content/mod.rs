//! Article page fetching and main-text extraction.

mod heuristic;

use std::time::Duration;

use crate::config::AppConfig;
use crate::feed::FeedFetcher;

pub use heuristic::HeuristicExtractor;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
}

/// Main text, comments and metadata pulled from one article page
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedContent {
    pub text: String,
    pub comments: Vec<String>,
    pub metadata: PageMetadata,
}

/// Turns an HTML document into main text and comments.
///
/// Implementations must not panic on arbitrary input; `None` means nothing
/// usable was found.
pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str) -> Option<ExtractedContent>;
}

/// Fetches article pages and runs an [`Extractor`] over them.
///
/// Never fails hard: any fetch error, timeout or empty extraction yields
/// `None`, and callers fall back to the feed item's description.
pub struct ContentExtractor {
    fetcher: FeedFetcher,
    timeout: Duration,
    extractor: Box<dyn Extractor>,
}

impl ContentExtractor {
    pub fn new(fetcher: FeedFetcher, timeout: Duration, extractor: Box<dyn Extractor>) -> Self {
        Self {
            fetcher,
            timeout,
            extractor,
        }
    }

    /// Build with the heuristic extractor and timeouts from config
    pub fn from_config(fetcher: FeedFetcher, config: &AppConfig) -> Self {
        Self::new(
            fetcher,
            Duration::from_secs(config.fetch.content_timeout_secs),
            Box::new(HeuristicExtractor::new(
                config.synth.max_comments,
                config.synth.max_comment_chars,
            )),
        )
    }

    pub async fn extract(&self, url: &str) -> Option<ExtractedContent> {
        let html = match self.fetcher.fetch_with_timeout(url, self.timeout).await {
            Ok(html) => html,
            Err(e) => {
                tracing::debug!("Content fetch failed for {}: {}", url, e);
                return None;
            }
        };

        let extraction = self.extractor.extract(&html);
        if extraction.is_none() {
            tracing::debug!("No main content found at {}", url);
        }
        extraction
    }
}
