use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::models::Post;
use super::persist::{read_document, write_document};
use crate::Result;

/// Per-category post collection backed by one JSON document.
///
/// Posts are unique by id and kept newest-first. Anything older than the
/// retention window is dropped on load and again on every save.
pub struct PostStore {
    path: PathBuf,
    history_days: u32,
    posts: Vec<Post>,
    ids: HashSet<String>,
}

impl PostStore {
    /// Load the document at `path`. A missing or corrupt document gives an
    /// empty store.
    pub fn load(path: &Path, history_days: u32) -> Self {
        let posts: Vec<Post> = read_document(path).unwrap_or_default();
        let loaded = posts.len();

        let mut store = Self {
            path: path.to_path_buf(),
            history_days,
            posts,
            ids: HashSet::new(),
        };
        store.prune(Utc::now());
        store.sort();
        store.rebuild_ids();

        tracing::debug!(
            "Loaded {} posts from {} ({} expired)",
            store.posts.len(),
            path.display(),
            loaded - store.posts.len()
        );
        store
    }

    /// Merge `new_posts`, prune expired entries, sort and persist.
    ///
    /// On an id collision the copy with the later publish/generation time
    /// wins; an exact tie goes to the incoming copy. Called even with no new
    /// posts so that retention still applies.
    pub fn save(&mut self, new_posts: Vec<Post>) -> Result<()> {
        let mut merged: HashMap<String, Post> = self
            .posts
            .drain(..)
            .map(|p| (p.id.clone(), p))
            .collect();

        for post in new_posts {
            match merged.get(&post.id) {
                Some(existing) if recency(existing) > recency(&post) => {}
                _ => {
                    merged.insert(post.id.clone(), post);
                }
            }
        }

        self.posts = merged.into_values().collect();
        self.prune(Utc::now());
        self.sort();
        // The id set tracks the in-memory posts even when the write fails
        self.rebuild_ids();
        write_document(&self.path, &self.posts)?;

        tracing::debug!("Saved {} posts to {}", self.posts.len(), self.path.display());
        Ok(())
    }

    pub fn has_post(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn existing_ids(&self) -> &HashSet<String> {
        &self.ids
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Oldest timestamp a post may carry and still be kept
    pub fn retention_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.history_days))
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = self.retention_cutoff(now);
        self.posts.retain(|p| p.effective_time() >= cutoff);
    }

    fn sort(&mut self) {
        self.posts.sort_by(|a, b| {
            recency(b)
                .cmp(&recency(a))
                .then_with(|| a.id.cmp(&b.id))
        });
    }

    fn rebuild_ids(&mut self) {
        self.ids = self.posts.iter().map(|p| p.id.clone()).collect();
    }
}

fn recency(post: &Post) -> (DateTime<Utc>, DateTime<Utc>) {
    (post.effective_time(), post.generated_at)
}
