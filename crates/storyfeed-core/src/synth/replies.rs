//! Typed parsers for the synthesizer's AI replies.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::ai::{extract_json_span, FromReply};
use crate::text::normalize_whitespace;

static DIGIT_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("digit pattern is valid"));

static LIST_MARKUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:[-*+•>#]+|\(?\d{1,2}[.):]|\[\d{1,2}\])\s*)+").expect("list markup pattern is valid")
});

/// Shortest remainder kept from a "Perspective N: ..." line
const MIN_LABELLED_CHARS: usize = 20;

/// 1-based item numbers picked by the pre-filter prompt, in reply order
#[derive(Debug, Clone, PartialEq)]
pub struct Selection(pub Vec<usize>);

impl FromReply for Selection {
    fn from_reply(reply: &str) -> Option<Self> {
        let mut picks = Vec::new();
        for m in DIGIT_RUN_RE.find_iter(reply) {
            if let Ok(n) = m.as_str().parse::<usize>() {
                if n > 0 && !picks.contains(&n) {
                    picks.push(n);
                }
            }
        }
        if picks.is_empty() {
            None
        } else {
            Some(Selection(picks))
        }
    }
}

/// Cleaned perspective lines, deduplicated, in reply order
#[derive(Debug, Clone, PartialEq)]
pub struct Perspectives(pub Vec<String>);

#[derive(Deserialize)]
struct PerspectivesJson {
    perspectives: Vec<String>,
}

impl FromReply for Perspectives {
    fn from_reply(reply: &str) -> Option<Self> {
        let raw: Vec<String> = match extract_json_span(reply)
            .and_then(|span| serde_json::from_str::<PerspectivesJson>(span).ok())
        {
            Some(parsed) => parsed.perspectives,
            None => candidate_lines(reply),
        };

        let mut cleaned: Vec<String> = Vec::new();
        for line in raw {
            if let Some(text) = clean_line(&line) {
                if !cleaned.iter().any(|c| c.eq_ignore_ascii_case(&text)) {
                    cleaned.push(text);
                }
            }
        }

        if cleaned.is_empty() {
            None
        } else {
            Some(Perspectives(cleaned))
        }
    }
}

/// Lines that may hold a perspective. Lead-ins ending in a colon are dropped,
/// and once any line carries list markup or a "Perspective" label only such
/// lines are kept, which leaves out unmarked preambles and closing remarks.
fn candidate_lines(reply: &str) -> Vec<String> {
    let lines: Vec<&str> = reply.lines().filter(|line| !is_lead_in(line)).collect();
    let marked: Vec<&str> = lines.iter().copied().filter(|line| is_marked(line)).collect();

    let chosen = if marked.is_empty() { lines } else { marked };
    chosen.into_iter().map(str::to_string).collect()
}

fn is_lead_in(line: &str) -> bool {
    line.trim()
        .trim_end_matches(|c| matches!(c, '*' | '_'))
        .trim_end()
        .ends_with(':')
}

fn is_marked(line: &str) -> bool {
    let trimmed = line.trim();
    LIST_MARKUP_RE.is_match(trimmed)
        || trimmed
            .trim_start_matches(|c| matches!(c, '*' | '_'))
            .to_lowercase()
            .starts_with("perspective")
}

/// Strip list and quote markup from one reply line.
///
/// Literal "Perspective ..." headings are dropped unless a substantial text
/// follows the colon.
pub fn clean_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.starts_with("```") {
        return None;
    }
    let stripped = LIST_MARKUP_RE.replace(trimmed, "");

    let unquoted = stripped
        .trim()
        .trim_matches(|c| matches!(c, '"' | '“' | '”' | '\'' | '*' | '_'))
        .trim();

    let body = if unquoted.to_lowercase().starts_with("perspective") {
        let (_, rest) = unquoted.split_once(':')?;
        let rest = rest
            .trim()
            .trim_matches(|c| matches!(c, '"' | '“' | '”' | '*'))
            .trim();
        if rest.chars().count() < MIN_LABELLED_CHARS {
            return None;
        }
        rest
    } else {
        unquoted
    };

    let normalized = normalize_whitespace(body);
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_parses_digit_runs() {
        let selection = Selection::from_reply("Top picks: 3, 1 and 3 again (then 12)").unwrap();
        assert_eq!(selection.0, vec![3, 1, 12]);
        assert!(Selection::from_reply("none of them").is_none());
        assert!(Selection::from_reply("0").is_none());
    }

    #[test]
    fn test_perspectives_from_json_block() {
        let reply = "```json\n{\"perspectives\": [\"First view on the matter\", \"Second view\", \"First view on the matter\"]}\n```";
        let parsed = Perspectives::from_reply(reply).unwrap();
        assert_eq!(parsed.0, vec!["First view on the matter", "Second view"]);
    }

    #[test]
    fn test_perspectives_line_by_line() {
        let reply = "Here are three perspectives:\n\
1. \"Engineers gain a simpler deployment story.\"\n\
- > Managers may worry about the migration cost.\n\
**Perspective 3:** Users mostly will not notice any difference at all.\n\
Perspective 4:\n";
        let parsed = Perspectives::from_reply(reply).unwrap();
        assert_eq!(
            parsed.0,
            vec![
                "Engineers gain a simpler deployment story.",
                "Managers may worry about the migration cost.",
                "Users mostly will not notice any difference at all.",
            ]
        );
    }

    #[test]
    fn test_perspectives_skip_unmarked_preamble() {
        let reply = "Here are three distinct perspectives on this story from the feed\n\
1. Operators will welcome the lower memory footprint on busy hosts.\n\
2. Security reviewers will want an audit of the new parsing code.\n\
3. Hobbyists get a faster build on older laptops.\n\
Let me know if you would like more detail on any of these.";
        let parsed = Perspectives::from_reply(reply).unwrap();
        assert_eq!(parsed.0.len(), 3);
        assert!(parsed.0[0].starts_with("Operators"));
        assert!(parsed.0[2].starts_with("Hobbyists"));
    }

    #[test]
    fn test_perspectives_unmarked_lines_without_lead_in() {
        let reply = "Sure, here you go:\n\
Operators will welcome the lower memory footprint.\n\
Security reviewers will want an audit first.\n\
Hobbyists get a faster build on older laptops.";
        let parsed = Perspectives::from_reply(reply).unwrap();
        assert_eq!(
            parsed.0,
            vec![
                "Operators will welcome the lower memory footprint.",
                "Security reviewers will want an audit first.",
                "Hobbyists get a faster build on older laptops.",
            ]
        );
    }

    #[test]
    fn test_clean_line_drops_bare_labels() {
        assert_eq!(clean_line("Perspective 2"), None);
        assert_eq!(clean_line("Perspective 2: short"), None);
        assert_eq!(clean_line("   "), None);
        assert_eq!(clean_line("* plain point"), Some("plain point".to_string()));
    }
}
