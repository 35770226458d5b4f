use std::sync::LazyLock;

use regex::Regex;

use super::{ExtractedContent, Extractor, PageMetadata};
use crate::text::{decode_entities, html_to_paragraphs, normalize_whitespace, truncate_chars};

const MAX_TEXT_CHARS: usize = 20_000;
const MIN_COMMENT_CHARS: usize = 20;

static NOISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<noscript\b.*?</noscript\s*>|<!--.*?-->")
        .expect("noise pattern is valid")
});

/// Main-content containers, most specific first
static CONTAINER_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?is)<article\b[^>]*>(.*?)</article\s*>",
        r"(?is)<main\b[^>]*>(.*?)</main\s*>",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("container pattern is valid"))
    .collect()
});

/// Opening tags of content-class `<div>`s, tried after the containers above.
/// The body runs to the matching `</div>`, so nested divs stay inside it.
static DIV_CONTAINER_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?is)<div\b[^>]*class\s*=\s*["'][^"']*\b(?:article-body|article-content|entry-content|post-content|post-body|story-body|content-body)\b[^"']*["'][^>]*>"#,
        r#"(?is)<div\b[^>]*(?:id|class)\s*=\s*["'][^"']*\bcontent\b[^"']*["'][^>]*>"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("div container pattern is valid"))
    .collect()
});

static DIV_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(/?)div\b[^>]*>").expect("div tag pattern is valid"));

static PARAGRAPH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<p\b[^>]*>(.*?)</p\s*>").expect("paragraph pattern is valid")
});

static COMMENT_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?is)<(?:div|li|article|section)\b[^>]*class\s*=\s*["'][^"']*\bcomment[-_]?(?:body|content|text)\b[^"']*["'][^>]*>(.*?)</(?:div|li|article|section)\s*>"#,
        r#"(?is)<(?:div|li|article)\b[^>]*class\s*=\s*["'][^"']*\bcomment\b[^"']*["'][^>]*>(.*?)</(?:div|li|article)\s*>"#,
        r#"(?is)<blockquote\b[^>]*class\s*=\s*["'][^"']*\b(?:reply|comment)\b[^"']*["'][^>]*>(.*?)</blockquote\s*>"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("comment pattern is valid"))
    .collect()
});

static OG_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta\b[^>]*property\s*=\s*["']og:title["'][^>]*content\s*=\s*["']([^"']*)["']"#)
        .expect("og:title pattern is valid")
});

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").expect("title pattern is valid")
});

static AUTHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta\b[^>]*name\s*=\s*["'](?:author|article:author)["'][^>]*content\s*=\s*["']([^"']*)["']"#)
        .expect("author pattern is valid")
});

/// Regex/tag-scanning extractor for article pages
pub struct HeuristicExtractor {
    max_comments: usize,
    max_comment_chars: usize,
}

impl HeuristicExtractor {
    pub fn new(max_comments: usize, max_comment_chars: usize) -> Self {
        Self {
            max_comments,
            max_comment_chars,
        }
    }

    fn main_text(&self, html: &str) -> Option<String> {
        for re in CONTAINER_RES.iter() {
            let text = re
                .captures_iter(html)
                .filter_map(|c| c.get(1))
                .map(|m| html_to_paragraphs(m.as_str()))
                .find(|t| !t.trim().is_empty());
            if text.is_some() {
                return text;
            }
        }

        for re in DIV_CONTAINER_RES.iter() {
            let text = re
                .find_iter(html)
                .map(|open| html_to_paragraphs(div_body(html, open.end())))
                .find(|t| !t.trim().is_empty());
            if text.is_some() {
                return text;
            }
        }

        // Last resort: every paragraph on the page
        let paragraphs: Vec<String> = PARAGRAPH_RE
            .captures_iter(html)
            .filter_map(|c| c.get(1))
            .map(|m| html_to_paragraphs(m.as_str()))
            .filter(|t| !t.trim().is_empty())
            .collect();
        if paragraphs.is_empty() {
            None
        } else {
            Some(paragraphs.join("\n"))
        }
    }

    fn comments(&self, html: &str) -> Vec<String> {
        let mut comments: Vec<String> = Vec::new();
        for re in COMMENT_RES.iter() {
            for caps in re.captures_iter(html) {
                if comments.len() >= self.max_comments {
                    return comments;
                }
                let Some(m) = caps.get(1) else { continue };
                let text = normalize_whitespace(&html_to_paragraphs(m.as_str()));
                if text.chars().count() < MIN_COMMENT_CHARS {
                    continue;
                }
                let text = truncate_chars(&text, self.max_comment_chars).to_string();
                if !comments.contains(&text) {
                    comments.push(text);
                }
            }
        }
        comments
    }

    fn metadata(&self, html: &str) -> PageMetadata {
        let title = OG_TITLE_RE
            .captures(html)
            .or_else(|| TITLE_RE.captures(html))
            .and_then(|c| c.get(1))
            .map(|m| normalize_whitespace(&decode_entities(m.as_str())))
            .filter(|t| !t.is_empty());

        let author = AUTHOR_RE
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| normalize_whitespace(&decode_entities(m.as_str())))
            .filter(|a| !a.is_empty());

        PageMetadata { title, author }
    }
}

/// Inner HTML of a `<div>` whose opening tag ends at `start`, up to its
/// matching `</div>` or the end of the page when that is missing
fn div_body(html: &str, start: usize) -> &str {
    let rest = &html[start..];
    let mut depth = 1usize;
    for caps in DIV_TAG_RE.captures_iter(rest) {
        if caps[1].is_empty() {
            depth += 1;
            continue;
        }
        depth -= 1;
        if depth == 0 {
            if let Some(close) = caps.get(0) {
                return &rest[..close.start()];
            }
        }
    }
    rest
}

impl Extractor for HeuristicExtractor {
    fn extract(&self, html: &str) -> Option<ExtractedContent> {
        let cleaned = NOISE_RE.replace_all(html, " ");

        let text = self.main_text(&cleaned)?;
        let text = truncate_chars(text.trim(), MAX_TEXT_CHARS).to_string();
        if text.is_empty() {
            return None;
        }

        Some(ExtractedContent {
            text,
            comments: self.comments(&cleaned),
            metadata: self.metadata(&cleaned),
        })
    }
}
