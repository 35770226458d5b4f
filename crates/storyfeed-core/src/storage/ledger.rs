use chrono::Utc;
use std::path::{Path, PathBuf};

use super::models::LedgerEntry;
use super::persist::{read_document, write_document};
use crate::Result;

/// Shared record of feeds that failed to fetch or parse, keyed by URL.
pub struct InvalidFeedLedger {
    path: PathBuf,
    entries: Vec<LedgerEntry>,
}

impl InvalidFeedLedger {
    pub fn load(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            entries: read_document(path).unwrap_or_default(),
        }
    }

    /// Count one failure for `url`, creating its entry on first sight
    pub fn record(&mut self, url: &str, name: &str, category: &str, error: &str) {
        let now = Utc::now();

        if let Some(entry) = self.entries.iter_mut().find(|e| e.url == url) {
            entry.name = name.to_string();
            entry.category = category.to_string();
            entry.last_error = error.to_string();
            entry.last_seen_at = now;
            entry.count = entry.count.saturating_add(1);
            return;
        }

        self.entries.push(LedgerEntry {
            url: url.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            last_error: error.to_string(),
            first_seen_at: now,
            last_seen_at: now,
            count: 1,
        });
    }

    pub fn save(&self) -> Result<()> {
        write_document(&self.path, &self.entries)
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn get(&self, url: &str) -> Option<&LedgerEntry> {
        self.entries.iter().find(|e| e.url == url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_increments_count_across_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invalid_feeds.json");

        for attempt in 1..=3 {
            let mut ledger = InvalidFeedLedger::load(&path);
            ledger.record("https://bad.example/feed", "Bad", "tech", &format!("HTTP status 50{attempt}"));
            ledger.save().unwrap();
        }

        let ledger = InvalidFeedLedger::load(&path);
        let entry = ledger.get("https://bad.example/feed").unwrap();
        assert_eq!(entry.count, 3);
        assert_eq!(entry.last_error, "HTTP status 503");
        assert!(entry.first_seen_at <= entry.last_seen_at);
        assert_eq!(ledger.entries().len(), 1);
    }

    #[test]
    fn test_corrupt_ledger_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invalid_feeds.json");
        std::fs::write(&path, "[{\"url\": 1}").unwrap();

        assert!(InvalidFeedLedger::load(&path).entries().is_empty());
    }
}
