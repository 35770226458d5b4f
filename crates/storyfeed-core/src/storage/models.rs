use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A durable, AI-enriched story served to the reading client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub essence: String,
    pub reactions: Vec<String>,
    /// Link to the original article
    pub source: String,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    pub feed_name: String,
    pub author: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promo_banner: Option<PromoBanner>,
}

impl Post {
    /// Timestamp used for ordering and retention
    pub fn effective_time(&self) -> DateTime<Utc> {
        self.published_at.unwrap_or(self.generated_at)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoBanner {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

/// Post identity derived from the source link only.
///
/// Title or content edits upstream never change the id, so a re-published
/// item is recognised as already stored.
pub fn post_id(link: &str) -> String {
    let digest = Sha256::digest(link.trim().as_bytes());
    digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}

/// One feed URL that has failed at least once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub url: String,
    pub name: String,
    pub category: String,
    pub last_error: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_id_depends_only_on_link() {
        let id = post_id("https://example.com/a");
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, post_id("  https://example.com/a\n"));
        assert_ne!(id, post_id("https://example.com/b"));
    }

    #[test]
    fn test_post_serializes_camel_case() {
        let post = Post {
            id: "abc".to_string(),
            title: "T".to_string(),
            essence: "E".to_string(),
            reactions: vec!["r".to_string()],
            source: "https://x/a".to_string(),
            generated_at: Utc::now(),
            published_at: None,
            feed_name: "Feed".to_string(),
            author: "Ann".to_string(),
            category: "tech".to_string(),
            promo_banner: Some(PromoBanner {
                text: "More".to_string(),
                url: None,
                background_color: Some("#fff".to_string()),
            }),
        };

        let json = serde_json::to_value(&post).unwrap();
        assert!(json.get("generatedAt").is_some());
        assert!(json.get("feedName").is_some());
        assert_eq!(json["promoBanner"]["backgroundColor"], "#fff");
        assert!(json["promoBanner"].get("url").is_none());
    }
}
