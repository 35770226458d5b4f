use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::{QualityConfig, SynthConfig};
use crate::text::word_count;

static PROPER_NOUN_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][a-zA-Z]+\s+[A-Z][a-zA-Z]+\b").expect("proper noun pattern is valid")
});

/// Quality gate for synthesized text, built from `[quality]` and the length
/// limits in `[synth]`.
#[derive(Debug, Clone)]
pub struct QualityPolicy {
    denylist: Vec<String>,
    essence_hit_threshold: usize,
    reaction_max_hits: usize,
    min_essence_words: usize,
    min_reaction_chars: usize,
}

impl QualityPolicy {
    pub fn new(quality: &QualityConfig, synth: &SynthConfig) -> Self {
        Self {
            denylist: quality
                .denylist
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            essence_hit_threshold: quality.essence_hit_threshold.max(1),
            reaction_max_hits: quality.reaction_max_hits,
            min_essence_words: synth.min_essence_words,
            min_reaction_chars: synth.min_reaction_chars,
        }
    }

    pub fn min_essence_words(&self) -> usize {
        self.min_essence_words
    }

    pub fn min_reaction_chars(&self) -> usize {
        self.min_reaction_chars
    }

    /// Total occurrences of denylisted phrases, case-insensitive
    pub fn denylist_hits(&self, text: &str) -> usize {
        let lower = text.to_lowercase();
        self.denylist
            .iter()
            .map(|phrase| lower.matches(phrase.as_str()).count())
            .sum()
    }

    /// Numerals or a capitalised word pair (a likely proper noun)
    pub fn has_concrete_signal(text: &str) -> bool {
        text.chars().any(|c| c.is_ascii_digit()) || PROPER_NOUN_PAIR_RE.is_match(text)
    }

    pub fn accepts_essence(&self, essence: &str) -> bool {
        if word_count(essence) < self.min_essence_words {
            return false;
        }
        self.denylist_hits(essence) < self.essence_hit_threshold || Self::has_concrete_signal(essence)
    }

    pub fn accepts_reaction(&self, reaction: &str) -> bool {
        reaction.trim().chars().count() >= self.min_reaction_chars
            && self.denylist_hits(reaction) <= self.reaction_max_hits
    }

    /// Exactly three distinct reactions, each acceptable on its own
    pub fn accepts_reactions(&self, reactions: &[String]) -> bool {
        if reactions.len() != 3 {
            return false;
        }
        let distinct: HashSet<String> = reactions.iter().map(|r| r.trim().to_lowercase()).collect();
        distinct.len() == reactions.len() && reactions.iter().all(|r| self.accepts_reaction(r))
    }
}
