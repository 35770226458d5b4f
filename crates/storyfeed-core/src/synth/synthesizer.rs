use chrono::Utc;
use std::sync::Arc;

use super::fallback;
use super::quality::QualityPolicy;
use super::replies::{clean_line, Perspectives, Selection};
use crate::ai::AiGateway;
use crate::config::{AppConfig, CategoryConfig, PromoConfig, SynthConfig};
use crate::content::ExtractedContent;
use crate::feed::{FeedConfig, Item};
use crate::storage::{post_id, Post, PromoBanner};
use crate::text::{strip_markdown, truncate_chars, truncate_words, word_count};

/// Source material sent to the AI is capped at this many characters
const MAX_PROMPT_CONTENT_CHARS: usize = 6000;
const PREVIEW_CHARS: usize = 160;
const SELECTION_MAX_TOKENS: u32 = 100;
const FOLLOWUP_MAX_TOKENS: u32 = 200;
const REACTION_COUNT: usize = 3;

/// The category a post is being synthesized for
#[derive(Clone, Copy)]
pub struct CategoryContext<'a> {
    pub name: &'a str,
    pub config: &'a CategoryConfig,
}

/// Builds one `Post` per item from feed data, extracted content and AI output.
///
/// Never fails: every AI step has a deterministic fallback, so a post with a
/// valid essence and three valid reactions is always produced.
pub struct PostSynthesizer {
    gateway: Arc<AiGateway>,
    config: SynthConfig,
    policy: QualityPolicy,
    promo: PromoConfig,
}

impl PostSynthesizer {
    pub fn new(gateway: Arc<AiGateway>, config: SynthConfig, policy: QualityPolicy, promo: PromoConfig) -> Self {
        Self {
            gateway,
            config,
            policy,
            promo,
        }
    }

    pub fn from_config(gateway: Arc<AiGateway>, config: &AppConfig) -> Self {
        Self::new(
            gateway,
            config.synth.clone(),
            QualityPolicy::new(&config.quality, &config.synth),
            config.promo.clone(),
        )
    }

    /// Pick up to `k` items worth turning into posts.
    ///
    /// Without a selection prompt, or when the AI picks nothing usable, the
    /// first `k` items are taken.
    pub async fn select<'a>(
        &self,
        items: &'a [Item],
        k: usize,
        feed: &FeedConfig,
        category: CategoryContext<'_>,
    ) -> Vec<&'a Item> {
        if items.len() <= k {
            return items.iter().collect();
        }
        let Some(template) = category.config.selection_prompt.as_deref() else {
            return items.iter().take(k).collect();
        };

        let candidates = &items[..items.len().min(self.config.max_candidates.max(k))];
        let listing = candidates
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}. {} - {}", i + 1, item.title, item.preview(PREVIEW_CHARS)))
            .collect::<Vec<_>>()
            .join("\n");
        let count = k.to_string();
        let prompt = with_instruction(
            render(
                template,
                "items",
                &listing,
                &[("count", count.as_str()), ("feed", feed.name.as_str())],
            ),
            &format!("Reply with the numbers of the best {k} items, most relevant first."),
        );

        let picked: Vec<&Item> = self
            .gateway
            .generate::<Selection>(&prompt, SELECTION_MAX_TOKENS)
            .await
            .map(|selection| {
                selection
                    .0
                    .into_iter()
                    .filter_map(|n| candidates.get(n - 1))
                    .take(k)
                    .collect()
            })
            .unwrap_or_default();

        if picked.is_empty() {
            tracing::debug!("Selection unavailable for {}, taking first {}", category.name, k);
            return items.iter().take(k).collect();
        }
        picked
    }

    pub async fn synthesize(
        &self,
        item: &Item,
        feed: &FeedConfig,
        category: CategoryContext<'_>,
        content: Option<&ExtractedContent>,
    ) -> Post {
        let metadata = content.map(|c| &c.metadata);
        let title = non_empty(&item.title)
            .or_else(|| metadata.and_then(|m| m.title.as_deref()).and_then(non_empty))
            .unwrap_or(feed.name.as_str())
            .to_string();
        let author = non_empty(&item.author)
            .or_else(|| metadata.and_then(|m| m.author.as_deref()).and_then(non_empty))
            .unwrap_or(feed.name.as_str())
            .to_string();

        let source_text = content
            .map(|c| c.text.as_str())
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(item.description.as_str());
        let comments = content.map(|c| c.comments.as_slice()).unwrap_or_default();

        let essence = self.essence(&title, feed, category, source_text).await;
        let reactions = self.reactions(&title, feed, category, source_text, comments).await;

        Post {
            id: post_id(&item.link),
            title,
            essence,
            reactions,
            source: item.link.trim().to_string(),
            generated_at: Utc::now(),
            published_at: Some(item.pub_date),
            feed_name: feed.name.clone(),
            author,
            category: category.name.to_string(),
            promo_banner: self.promo_banner(feed, category.config),
        }
    }

    async fn essence(&self, title: &str, feed: &FeedConfig, category: CategoryContext<'_>, source_text: &str) -> String {
        let mut candidate = None;

        if let Some(template) = category.config.essence_prompt.as_deref() {
            let prompt = with_instruction(
                render(
                    template,
                    "content",
                    truncate_chars(source_text, MAX_PROMPT_CONTENT_CHARS),
                    &[("title", title), ("feed", feed.name.as_str())],
                ),
                &format!(
                    "Write the summary as plain text of {}-{} words, with no markdown, headings or lists.",
                    self.config.target_essence_words, self.config.max_essence_words
                ),
            );
            candidate = self
                .gateway
                .analyze(&prompt, self.gateway.max_tokens())
                .await
                .map(|reply| strip_markdown(&reply))
                .filter(|text| word_count(text) >= self.policy.min_essence_words());
            if candidate.is_none() {
                tracing::debug!("No usable AI essence for '{}', using source text", title);
            }
        }

        let mut essence = candidate.unwrap_or_else(|| source_text.trim().to_string());
        if word_count(&essence) > self.config.max_essence_words {
            essence = truncate_words(&essence, self.config.max_essence_words);
        }

        if self.policy.accepts_essence(&essence) {
            essence
        } else {
            tracing::debug!("Essence for '{}' rejected, using fallback template", title);
            fallback::essence(title, &feed.name, self.policy.min_essence_words())
        }
    }

    async fn reactions(
        &self,
        title: &str,
        feed: &FeedConfig,
        category: CategoryContext<'_>,
        source_text: &str,
        comments: &[String],
    ) -> Vec<String> {
        let mut accepted: Vec<String> = Vec::new();

        if let Some(template) = category.config.perspectives_prompt.as_deref() {
            let mut material = truncate_chars(source_text, MAX_PROMPT_CONTENT_CHARS).to_string();
            if !comments.is_empty() {
                material.push_str("\n\nReader comments:\n");
                material.push_str(&comments.join("\n"));
            }
            let prompt = with_instruction(
                render(
                    template,
                    "content",
                    &material,
                    &[("title", title), ("feed", feed.name.as_str()), ("count", "3")],
                ),
                &format!("Reply with exactly {REACTION_COUNT} distinct perspectives, one per line."),
            );

            if let Some(Perspectives(lines)) = self.gateway.generate::<Perspectives>(&prompt, self.gateway.max_tokens()).await {
                for line in lines {
                    self.accept_reaction(&mut accepted, line);
                }
            }

            let mut followups = 0;
            while accepted.len() < REACTION_COUNT && followups < self.config.max_followups && self.gateway.is_enabled() {
                followups += 1;
                let prompt = followup_prompt(title, &feed.name, source_text, &accepted);
                let line = self
                    .gateway
                    .analyze(&prompt, FOLLOWUP_MAX_TOKENS)
                    .await
                    .and_then(|reply| reply.lines().find_map(clean_line));
                if let Some(line) = line {
                    self.accept_reaction(&mut accepted, line);
                }
            }
        }

        let templates = fallback::reactions(title, &feed.name, self.policy.min_reaction_chars());
        if accepted.len() < REACTION_COUNT {
            tracing::debug!(
                "Only {} AI reactions for '{}', filling from templates",
                accepted.len(),
                title
            );
            for template in &templates {
                if accepted.len() == REACTION_COUNT {
                    break;
                }
                self.accept_reaction(&mut accepted, template.clone());
            }
        }

        if self.policy.accepts_reactions(&accepted) {
            accepted
        } else {
            templates.to_vec()
        }
    }

    fn accept_reaction(&self, accepted: &mut Vec<String>, reaction: String) {
        if accepted.len() < REACTION_COUNT
            && self.policy.accepts_reaction(&reaction)
            && !accepted.iter().any(|r| r.trim().eq_ignore_ascii_case(reaction.trim()))
        {
            accepted.push(reaction);
        }
    }

    fn promo_banner(&self, feed: &FeedConfig, category: &CategoryConfig) -> Option<PromoBanner> {
        if let Some(banner) = category.promo_banner.as_ref().filter(|b| b.enabled) {
            return Some(PromoBanner {
                text: banner.text.replace("{feed}", &feed.name),
                url: banner.url.clone(),
                background_color: feed.background_color.clone(),
            });
        }
        if self.promo.enabled {
            return Some(PromoBanner {
                text: self.promo.text.replace("{feed}", &feed.name),
                url: None,
                background_color: feed.background_color.clone(),
            });
        }
        None
    }
}

/// Fill `{name}` placeholders. A template lacking its primary placeholder gets
/// the primary material appended instead.
fn render(template: &str, primary: &str, material: &str, vars: &[(&str, &str)]) -> String {
    let placeholder = format!("{{{primary}}}");
    let mut prompt = template.to_string();
    for (name, value) in vars {
        prompt = prompt.replace(&format!("{{{name}}}"), value);
    }

    if prompt.contains(&placeholder) {
        prompt.replace(&placeholder, material)
    } else {
        format!("{}\n\n{}", prompt.trim_end(), material)
    }
}

fn with_instruction(prompt: String, instruction: &str) -> String {
    format!("{}\n\n{}", prompt.trim_end(), instruction)
}

fn followup_prompt(title: &str, feed_name: &str, source_text: &str, existing: &[String]) -> String {
    let mut prompt = format!(
        "Write ONE short perspective (one or two sentences) on the story \"{title}\" from {feed_name}. \
Reply with the perspective only, no numbering or labels.\n"
    );
    if !existing.is_empty() {
        prompt.push_str("It must differ from these:\n");
        for r in existing {
            prompt.push_str(&format!("- {r}\n"));
        }
    }
    prompt.push_str(&format!("\nStory:\n{}", truncate_chars(source_text, 2000)));
    prompt
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
