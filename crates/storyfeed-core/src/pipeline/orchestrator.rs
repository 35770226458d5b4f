use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;

use crate::ai::AiGateway;
use crate::config::{AppConfig, CategoryConfig};
use crate::content::ContentExtractor;
use crate::feed::{parse_items, FeedConfig, FeedFetcher, Item};
use crate::storage::{post_id, InvalidFeedLedger, Post, PostStore};
use crate::synth::{CategoryContext, PostSynthesizer};
use crate::{Error, Result};

/// Totals for one pipeline run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub new_posts: usize,
    /// Items handed to the synthesizer plus items skipped for lacking a link
    pub items_processed: usize,
    pub categories_processed: usize,
    pub categories_failed: usize,
    pub feeds_failed: usize,
    pub skipped: usize,
    pub feeds: Vec<FeedReport>,
}

/// Outcome of one feed within a category
#[derive(Debug, Clone, PartialEq)]
pub struct FeedReport {
    pub category: String,
    pub feed: String,
    pub new_posts: usize,
    pub error: Option<String>,
}

#[derive(Default)]
struct FeedOutcome {
    posts: Vec<Post>,
    skipped: usize,
}

/// Wires fetcher, extractor, synthesizer and stores for each category.
///
/// Categories, feeds and items are processed one at a time. A failing feed
/// is written to the invalid-feed ledger and the category moves on; a failing
/// category is counted and the run moves on.
pub struct Pipeline {
    config: AppConfig,
    fetcher: FeedFetcher,
    extractor: ContentExtractor,
    synthesizer: PostSynthesizer,
}

impl Pipeline {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let gateway = AiGateway::from_config(&config.ai)?;
        Self::with_gateway(config, gateway)
    }

    /// Build with an explicit AI gateway instead of the configured providers
    pub fn with_gateway(config: &AppConfig, gateway: AiGateway) -> Result<Self> {
        let fetcher = FeedFetcher::new(&config.fetch)?;
        let extractor = ContentExtractor::from_config(fetcher.clone(), config);
        let synthesizer = PostSynthesizer::from_config(Arc::new(gateway), config);

        Ok(Self {
            config: config.clone(),
            fetcher,
            extractor,
            synthesizer,
        })
    }

    /// Category names a target resolves to. `None` and `"all"` mean every
    /// configured category.
    pub fn resolve_targets(&self, target: Option<&str>) -> Result<Vec<String>> {
        match target {
            None | Some("all") => Ok(self.config.general.categories.clone()),
            Some(name) => {
                let known = self.config.general.categories.iter().any(|c| c == name)
                    || self.config.category_config_path(name).is_file();
                if known {
                    Ok(vec![name.to_string()])
                } else {
                    Err(Error::CategoryNotFound(name.to_string()))
                }
            }
        }
    }

    pub async fn run(&self, target: Option<&str>) -> Result<RunSummary> {
        let categories = self.resolve_targets(target)?;
        let mut ledger = InvalidFeedLedger::load(&self.config.ledger_path());
        let mut summary = RunSummary::default();

        if categories.is_empty() {
            tracing::warn!("No categories configured");
        }

        for name in &categories {
            match self.process_category(name, &mut ledger, &mut summary).await {
                Ok(()) => summary.categories_processed += 1,
                Err(e) => {
                    tracing::error!("Category '{}' failed: {}", name, e);
                    summary.categories_failed += 1;
                }
            }
        }

        tracing::info!(
            "Run complete: {} new posts, {} items processed, {} categories",
            summary.new_posts,
            summary.items_processed,
            summary.categories_processed
        );
        Ok(summary)
    }

    /// Process every enabled feed of one category, then save its store once.
    pub async fn process_category(
        &self,
        name: &str,
        ledger: &mut InvalidFeedLedger,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let category_config = CategoryConfig::load(&self.config.category_config_path(name))?;
        let mut store = PostStore::load(&self.config.posts_path(name), category_config.history_days);
        let category = CategoryContext {
            name,
            config: &category_config,
        };

        tracing::info!(
            "Processing category '{}' ({} stored posts)",
            name,
            store.len()
        );

        let cutoff = store.retention_cutoff(Utc::now());
        let mut seen: HashSet<String> = HashSet::new();
        let mut new_posts: Vec<Post> = Vec::new();

        for feed in category_config.enabled_feeds() {
            tracing::info!("Refreshing feed: {}", feed.name);

            match self.process_feed(feed, category, &store, &mut seen, cutoff).await {
                Ok(outcome) => {
                    tracing::info!("Feed '{}': {} new posts", feed.name, outcome.posts.len());
                    summary.items_processed += outcome.posts.len() + outcome.skipped;
                    summary.skipped += outcome.skipped;
                    summary.feeds.push(FeedReport {
                        category: name.to_string(),
                        feed: feed.name.clone(),
                        new_posts: outcome.posts.len(),
                        error: None,
                    });
                    new_posts.extend(outcome.posts);
                }
                Err(e) => {
                    let message = e.to_string();
                    tracing::warn!("Failed to process feed '{}': {}", feed.name, message);
                    ledger.record(&feed.url, &feed.name, name, &message);
                    if let Err(e) = ledger.save() {
                        tracing::warn!("Failed to save invalid-feed ledger: {}", e);
                    }
                    summary.feeds_failed += 1;
                    summary.feeds.push(FeedReport {
                        category: name.to_string(),
                        feed: feed.name.clone(),
                        new_posts: 0,
                        error: Some(message),
                    });
                }
            }
        }

        let added = new_posts.len();
        store.save(new_posts)?;
        summary.new_posts += added;

        tracing::info!("Category '{}': {} new posts, {} stored", name, added, store.len());
        Ok(())
    }

    async fn process_feed(
        &self,
        feed: &FeedConfig,
        category: CategoryContext<'_>,
        store: &PostStore,
        seen: &mut HashSet<String>,
        cutoff: DateTime<Utc>,
    ) -> Result<FeedOutcome> {
        let xml = self.fetcher.fetch(&feed.url).await?;
        let items = parse_items(&xml, category.name)?;
        let mut outcome = FeedOutcome::default();

        let mut fresh: Vec<Item> = Vec::new();
        let mut fresh_ids: HashSet<String> = HashSet::new();
        for item in items {
            if item.link.trim().is_empty() {
                tracing::debug!("Skipping item without link: {}", item.title);
                outcome.skipped += 1;
                continue;
            }
            let id = post_id(&item.link);
            if store.has_post(&id) || seen.contains(&id) || item.pub_date < cutoff {
                continue;
            }
            if fresh_ids.insert(id) {
                fresh.push(item);
            }
        }

        if fresh.is_empty() {
            return Ok(outcome);
        }

        let selected = self
            .synthesizer
            .select(&fresh, category.config.top_posts_per_feed, feed, category)
            .await;

        for item in selected {
            let content = self.extractor.extract(&item.link).await;
            let post = self.synthesizer.synthesize(item, feed, category, content.as_ref()).await;
            tracing::debug!("Synthesized post '{}' ({})", post.title, post.id);
            seen.insert(post.id.clone());
            outcome.posts.push(post);
        }

        Ok(outcome)
    }
}
