use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A configured feed source within a category
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub background_color: Option<String>,
}

fn default_enabled() -> bool {
    true
}

/// One RSS/Atom entry, alive only for a single feed-processing iteration
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub title: String,
    pub description: String,
    pub link: String,
    pub pub_date: DateTime<Utc>,
    pub author: String,
    pub category: String,
}

impl Item {
    /// Description trimmed to a short single-line preview
    pub fn preview(&self, max_chars: usize) -> &str {
        crate::text::truncate_chars(&self.description, max_chars)
    }
}
