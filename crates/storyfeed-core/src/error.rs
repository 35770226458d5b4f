use std::time::Duration;

use thiserror::Error;

/// Failures of a single HTTP fetch (feed or article page)
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("Empty response body")]
    EmptyResponse,

    #[error("Response too large ({0} bytes)")]
    TooLarge(usize),

    #[error("Blocked by a JavaScript challenge page")]
    Blocked,
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return FetchError::HttpStatus(status.as_u16());
        }
        FetchError::Network(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Feed parsing error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("AI provider error: {0}")]
    AiProvider(String),

    #[error("Category not found: {0}")]
    CategoryNotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;
