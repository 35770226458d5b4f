//! Markup-to-text helpers shared by the feed parser, the content extractor
//! and the synthesizer.
//!
//! Everything here is best-effort string scanning: feeds and article pages are
//! routinely malformed, so nothing in this module returns an error.

use std::borrow::Cow;
use std::sync::LazyLock;

use quick_xml::escape::resolve_html5_entity;
use regex::{Captures, Regex};

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[A-Za-z][A-Za-z0-9]{1,31});")
        .expect("entity pattern is valid")
});

static CDATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("cdata pattern is valid")
});

static MD_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").expect("markdown link pattern is valid")
});

static MD_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s{0,3}(?:#{1,6}\s+|>\s?|[-*+•]\s+|\d{1,2}[.)]\s+)")
        .expect("markdown prefix pattern is valid")
});

/// Lines containing one of these are dropped from extracted article text
const BOILERPLATE_MARKERS: &[&str] = &[
    "subscribe to our newsletter",
    "sign up for our newsletter",
    "all rights reserved",
    "we use cookies",
    "accept cookies",
    "cookie policy",
    "share this article",
    "share on facebook",
    "share on twitter",
    "follow us on",
    "advertisement",
    "click here to",
    "related articles",
    "terms of service",
    "privacy policy",
];

/// Decode HTML character references: the full HTML5 named entity table plus
/// decimal and hexadecimal numeric references. Unknown entities are kept as-is.
pub fn decode_entities(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }

    ENTITY_RE.replace_all(input, |caps: &Captures| {
        let body = &caps[1];
        let decoded = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
            u32::from_str_radix(hex, 16).ok().and_then(char::from_u32).map(String::from)
        } else if let Some(dec) = body.strip_prefix('#') {
            dec.parse::<u32>().ok().and_then(char::from_u32).map(String::from)
        } else {
            resolve_html5_entity(body).map(str::to_string)
        };
        decoded.unwrap_or_else(|| caps[0].to_string())
    })
}

/// Return the content of the first CDATA section, if any
pub fn cdata_content(input: &str) -> Option<&str> {
    CDATA_RE
        .captures(input)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Replace every CDATA wrapper with its raw content
pub fn unwrap_cdata(input: &str) -> Cow<'_, str> {
    CDATA_RE.replace_all(input, "$1")
}

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote",
    "section", "article", "tr", "table", "pre", "header", "footer", "figure",
];

const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "address", "aside", "audio", "b", "bdi", "bdo", "big", "body", "button",
    "canvas", "caption", "center", "cite", "code", "col", "colgroup", "dd", "del", "details",
    "dfn", "dialog", "dl", "dt", "em", "embed", "fieldset", "figcaption", "font", "form",
    "head", "hr", "html", "i", "iframe", "img", "input", "ins", "kbd", "label", "legend",
    "link", "main", "mark", "meta", "nav", "noscript", "object", "option", "picture", "q",
    "s", "samp", "script", "select", "small", "source", "span", "strike", "strong", "style",
    "sub", "summary", "sup", "svg", "tbody", "td", "template", "textarea", "tfoot", "th",
    "thead", "time", "title", "track", "tt", "u", "var", "video", "wbr",
];

/// Length in bytes of the markup tag starting at `rest` (just after `<`), or
/// `None` when the `<` is literal text such as "a < b" or "Vec<T>".
fn tag_len(rest: &str) -> Option<usize> {
    if let Some(comment) = rest.strip_prefix("!--") {
        return comment.find("-->").map(|end| 3 + end + 3);
    }
    if rest.starts_with('!') || rest.starts_with('?') {
        return rest.find('>').map(|end| end + 1);
    }

    let name_part = rest.strip_prefix('/').unwrap_or(rest);
    let name: String = name_part
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == ':')
        .collect::<String>()
        .to_ascii_lowercase();
    let known = BLOCK_TAGS.contains(&name.as_str())
        || INLINE_TAGS.contains(&name.as_str())
        || (name.len() > 1 && name.contains(['-', ':']));
    if !known {
        return None;
    }

    let after_name = &name_part[name.len()..];
    if !after_name.is_empty() && !after_name.starts_with(|c: char| c.is_whitespace() || c == '>' || c == '/') {
        return None;
    }

    let end = rest.find('>')?;
    if rest[..end].contains('<') {
        return None;
    }
    Some(end + 1)
}

fn tag_name(rest: &str) -> String {
    rest.trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Remove markup tags. Block-level tags become line breaks so paragraph
/// structure survives for the boilerplate filter. Only recognised HTML tags
/// are removed; any other `<` stays in the text.
pub fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pos = 0;

    while let Some(rel) = input[pos..].find('<') {
        let idx = pos + rel;
        out.push_str(&input[pos..idx]);

        let rest = &input[idx + 1..];
        match tag_len(rest) {
            Some(len) => {
                if BLOCK_TAGS.contains(&tag_name(rest).as_str()) {
                    out.push('\n');
                } else {
                    out.push(' ');
                }
                pos = idx + 1 + len;
            }
            None => {
                out.push('<');
                pos = idx + 1;
            }
        }
    }

    out.push_str(&input[pos..]);
    out
}

/// Collapse runs of whitespace into single spaces and trim
pub fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse whitespace per line, dropping empty lines
pub fn normalize_lines(input: &str) -> String {
    input
        .lines()
        .map(normalize_whitespace)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drop lines that are site chrome rather than article prose
pub fn strip_boilerplate(input: &str) -> String {
    input
        .lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            !BOILERPLATE_MARKERS.iter().any(|m| lower.contains(m))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full pipeline for a fragment of HTML: tags out, entities decoded,
/// whitespace collapsed to a single line.
pub fn html_to_text(html: &str) -> String {
    let stripped = strip_tags(&unwrap_cdata(html));
    normalize_whitespace(&decode_entities(&stripped))
}

/// Like [`html_to_text`] but keeps paragraph breaks and removes boilerplate lines
pub fn html_to_paragraphs(html: &str) -> String {
    let stripped = strip_tags(html);
    let decoded = decode_entities(&stripped);
    strip_boilerplate(&normalize_lines(&decoded))
}

/// Remove common markdown artifacts from model output
pub fn strip_markdown(input: &str) -> String {
    let text = MD_LINK_RE.replace_all(input, "$1");
    let text = MD_PREFIX_RE.replace_all(&text, "");
    let text = text.replace("```", "").replace("**", "").replace("__", "").replace('`', "");
    normalize_lines(&text)
}

pub fn word_count(input: &str) -> usize {
    input.split_whitespace().count()
}

/// Keep at most `max_words` words, collapsing whitespace
pub fn truncate_words(input: &str, max_words: usize) -> String {
    input
        .split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn truncate_chars(input: &str, max_chars: usize) -> &str {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => &input[..idx],
        None => input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_named_and_numeric_entities() {
        assert_eq!(decode_entities("A &amp; B"), "A & B");
        assert_eq!(decode_entities("&lt;b&gt; &quot;q&quot; &#39;s&#39;"), "<b> \"q\" 's'");
        assert_eq!(decode_entities("caf&eacute; &hellip; &#x2014; &#8364;"), "café … — €");
        assert_eq!(decode_entities("&nbsp;"), "\u{a0}");
    }

    #[test]
    fn test_decode_keeps_unknown_entities() {
        assert_eq!(decode_entities("fish &chips; & more"), "fish &chips; & more");
    }

    #[test]
    fn test_strip_tags_keeps_bare_angle_brackets() {
        assert_eq!(normalize_whitespace(&strip_tags("a < b and <b>bold</b>")), "a < b and bold");
        assert_eq!(strip_tags("<p>one</p><p>two</p>").trim(), "one\n\ntwo");
    }

    #[test]
    fn test_strip_tags_keeps_text_that_only_looks_like_markup() {
        assert_eq!(normalize_whitespace(&strip_tags("Why Vec<T> beats arrays")), "Why Vec<T> beats arrays");
        assert_eq!(
            strip_tags("cost <revenue and the rest of the sentence"),
            "cost <revenue and the rest of the sentence"
        );
        assert_eq!(normalize_whitespace(&strip_tags("x <!-- note --> y <a href=\"/z\">z</a>")), "x y z");
        assert_eq!(normalize_whitespace(&strip_tags("<my-widget data-x=\"1\">w</my-widget>")), "w");
    }

    #[test]
    fn test_html_to_text_prefers_cdata_body() {
        let html = "<![CDATA[<p>Hello &amp; <em>welcome</em></p>]]>";
        assert_eq!(html_to_text(html), "Hello & welcome");
    }

    #[test]
    fn test_strip_boilerplate_lines() {
        let text = "Real paragraph here.\nSubscribe to our newsletter today!\nAnother fact.";
        assert_eq!(strip_boilerplate(text), "Real paragraph here.\nAnother fact.");
    }

    #[test]
    fn test_strip_markdown() {
        let md = "## Summary\n**Bold** claim with [a link](https://x.example).\n- item one";
        assert_eq!(strip_markdown(md), "Summary\nBold claim with a link.\nitem one");
    }

    #[test]
    fn test_truncate_words() {
        assert_eq!(truncate_words("one  two\nthree four", 3), "one two three");
        assert_eq!(word_count(" a b  c "), 3);
    }
}
