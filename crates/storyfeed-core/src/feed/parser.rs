//! RSS/Atom item parsing.
//!
//! Well-formed documents go through `feed-rs`. Real feeds are frequently not
//! well-formed XML (unescaped ampersands, HTML pasted into descriptions,
//! truncated documents), so when `feed-rs` rejects a document or finds fewer
//! entries than the text holds, a tolerant scanner looks for `<item>`/`<entry>`
//! blocks and pulls fields out of each block by tag name.

use chrono::{DateTime, NaiveDateTime, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;
use tracing::debug;

use super::models::Item;
use crate::text::{cdata_content, decode_entities, html_to_text};
use crate::{Error, Result};

const DESCRIPTION_TAGS: &[&str] = &["description", "content:encoded", "summary", "content"];
const DATE_TAGS: &[&str] = &["pubDate", "published", "updated", "dc:date"];

/// Parse a feed document into items, newest first.
///
/// Items without both a title and a link are dropped. Items whose date cannot
/// be parsed are kept and dated "now". A document that contains no item blocks
/// and does not even look like a feed is a parse error.
pub fn parse_items(xml: &str, default_category: &str) -> Result<Vec<Item>> {
    let now = Utc::now();
    let lower = xml.to_ascii_lowercase();
    let blocks = item_blocks(xml, &lower);

    let mut items = match parse_well_formed(xml, blocks.len(), default_category, now) {
        Some(items) => items,
        None => scan_items(blocks, &lower, default_category, now)?,
    };

    items.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
    Ok(items)
}

/// `None` hands the document over to the scanner, including when the strict
/// parse saw fewer entries than there are item blocks in the text.
fn parse_well_formed(
    xml: &str,
    block_count: usize,
    default_category: &str,
    now: DateTime<Utc>,
) -> Option<Vec<Item>> {
    let feed = match parser::parse(xml.as_bytes()) {
        Ok(feed) => feed,
        Err(e) => {
            debug!("Strict feed parse failed, scanning instead: {}", e);
            return None;
        }
    };
    if feed.entries.is_empty() || feed.entries.len() < block_count {
        debug!(
            "Strict feed parse found {} entries for {} item blocks, scanning instead",
            feed.entries.len(),
            block_count
        );
        return None;
    }

    Some(
        feed.entries
            .into_iter()
            .filter_map(|entry| entry_to_item(entry, default_category, now))
            .collect(),
    )
}

fn entry_to_item(entry: Entry, default_category: &str, now: DateTime<Utc>) -> Option<Item> {
    let title = entry.title.map(|t| html_to_text(&t.content)).unwrap_or_default();

    let link = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| entry.links.first())
        .map(|l| l.href.trim().to_string())
        .or_else(|| entry.id.starts_with("http").then(|| entry.id.trim().to_string()))
        .unwrap_or_default();

    if title.is_empty() && link.is_empty() {
        return None;
    }

    let description = entry
        .summary
        .map(|s| html_to_text(&s.content))
        .filter(|d| !d.is_empty())
        .or_else(|| entry.content.and_then(|c| c.body).map(|body| html_to_text(&body)))
        .unwrap_or_default();

    let author = entry
        .authors
        .first()
        .map(|a| html_to_text(&a.name))
        .unwrap_or_default();

    let category = entry
        .categories
        .first()
        .map(|c| html_to_text(&c.term))
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| default_category.to_string());

    Some(Item {
        title,
        description,
        link,
        pub_date: entry.published.or(entry.updated).unwrap_or(now),
        author,
        category,
    })
}

fn item_blocks<'a>(xml: &'a str, lower: &str) -> Vec<&'a str> {
    let blocks = find_blocks(xml, lower, "item");
    if blocks.is_empty() {
        find_blocks(xml, lower, "entry")
    } else {
        blocks
    }
}

fn scan_items(
    blocks: Vec<&str>,
    lower: &str,
    default_category: &str,
    now: DateTime<Utc>,
) -> Result<Vec<Item>> {
    if blocks.is_empty() {
        let looks_like_feed = ["<rss", "<feed", "<rdf:rdf", "<channel"]
            .iter()
            .any(|marker| lower.contains(marker));
        if !looks_like_feed {
            return Err(Error::Parse("document contains no RSS/Atom items".to_string()));
        }
        return Ok(Vec::new());
    }

    Ok(blocks
        .into_iter()
        .filter_map(|block| parse_block(block, default_category, now))
        .collect())
}

fn parse_block(block: &str, default_category: &str, now: DateTime<Utc>) -> Option<Item> {
    let title = field_text(block, "title").unwrap_or_default();
    let link = extract_link(block).unwrap_or_default();

    if title.is_empty() && link.is_empty() {
        return None;
    }

    let description = DESCRIPTION_TAGS
        .iter()
        .filter_map(|tag| field_text(block, tag))
        .find(|text| !text.is_empty())
        .unwrap_or_default();

    let pub_date = DATE_TAGS
        .iter()
        .filter_map(|tag| field_text(block, tag))
        .find_map(|raw| parse_date(&raw))
        .unwrap_or(now);

    let author = extract_author(block).unwrap_or_default();

    let category = field_text(block, "category")
        .filter(|c| !c.is_empty())
        .or_else(|| tag_attr(block, "category", "term").map(|t| html_to_text(&t)))
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| default_category.to_string());

    Some(Item {
        title,
        description,
        link,
        pub_date,
        author,
        category,
    })
}

/// Locate every `<name ...>` block. A block ends at its closing tag, or at the
/// next opening tag / end of input when the closing tag is missing.
fn find_blocks<'a>(xml: &'a str, lower: &str, name: &str) -> Vec<&'a str> {
    let open = format!("<{name}");
    let close = format!("</{name}>");

    let starts: Vec<usize> = lower
        .match_indices(&open)
        .map(|(i, _)| i)
        .filter(|&i| is_name_boundary(lower, i + open.len()))
        .collect();

    let mut blocks = Vec::with_capacity(starts.len());
    for (n, &start) in starts.iter().enumerate() {
        let limit = starts.get(n + 1).copied().unwrap_or(xml.len());
        let end = lower[start..limit]
            .find(&close)
            .map(|offset| start + offset + close.len())
            .unwrap_or(limit);
        blocks.push(&xml[start..end]);
    }
    blocks
}

fn is_name_boundary(lower: &str, pos: usize) -> bool {
    matches!(
        lower.as_bytes().get(pos),
        None | Some(b'>') | Some(b'/') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r')
    )
}

/// Locate the first `<name ...>` tag in `block` and return its attribute text
/// and raw inner content (empty for a self-closing tag).
fn find_tag<'a>(block: &'a str, name: &str) -> Option<(&'a str, &'a str)> {
    let lower = block.to_ascii_lowercase();
    let name_lower = name.to_ascii_lowercase();
    let open = format!("<{name_lower}");
    let close = format!("</{name_lower}");

    let mut search_from = 0;
    loop {
        let rel = lower[search_from..].find(&open)?;
        let start = search_from + rel;
        let after_name = start + open.len();
        if !is_name_boundary(&lower, after_name) {
            search_from = after_name;
            continue;
        }

        let tag_end = after_name + lower[after_name..].find('>')?;
        let attrs = &block[after_name..tag_end];
        if attrs.trim_end().ends_with('/') {
            return Some((attrs.trim_end().trim_end_matches('/'), ""));
        }

        let inner_start = tag_end + 1;
        let inner_end = lower[inner_start..]
            .find(&close)
            .map(|offset| inner_start + offset)
            .unwrap_or(block.len());
        return Some((attrs, &block[inner_start..inner_end]));
    }
}

/// Text content of the first `<name>` element: CDATA preferred, entity-decoded,
/// tag-stripped and whitespace-normalised.
fn field_text(block: &str, name: &str) -> Option<String> {
    let (_, inner) = find_tag(block, name)?;
    Some(clean_field(inner))
}

fn clean_field(raw: &str) -> String {
    match cdata_content(raw) {
        Some(cdata) => html_to_text(cdata),
        // Outside CDATA the markup itself is escaped once at the XML level
        None => html_to_text(&decode_entities(raw)),
    }
}

fn attr_value(attrs: &str, attr: &str) -> Option<String> {
    let lower = attrs.to_ascii_lowercase();
    let needle = format!("{}=", attr.to_ascii_lowercase());
    let mut search_from = 0;
    while let Some(rel) = lower[search_from..].find(&needle) {
        let pos = search_from + rel;
        let preceded_ok = pos == 0
            || lower[..pos].ends_with(|c: char| c.is_whitespace());
        let value_start = pos + needle.len();
        if preceded_ok {
            let rest = &attrs[value_start..];
            let quote = rest.chars().next()?;
            if quote == '"' || quote == '\'' {
                let end = rest[1..].find(quote)?;
                return Some(decode_entities(&rest[1..1 + end]).into_owned());
            }
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            return Some(rest[..end].to_string());
        }
        search_from = value_start;
    }
    None
}

fn tag_attr(block: &str, name: &str, attr: &str) -> Option<String> {
    let (attrs, _) = find_tag(block, name)?;
    attr_value(attrs, attr)
}

/// RSS `<link>text</link>`, Atom `<link href rel="alternate"/>`, or a
/// permalink `<guid>`.
fn extract_link(block: &str) -> Option<String> {
    let lower = block.to_ascii_lowercase();
    let mut atom_fallback = None;
    let mut search_from = 0;

    while let Some(rel) = lower[search_from..].find("<link") {
        let start = search_from + rel;
        search_from = start + 5;
        if !is_name_boundary(&lower, start + 5) {
            continue;
        }
        let Some((attrs, inner)) = find_tag(&block[start..], "link") else {
            break;
        };

        if let Some(href) = attr_value(attrs, "href") {
            let rel_attr = attr_value(attrs, "rel").unwrap_or_else(|| "alternate".to_string());
            if rel_attr == "alternate" {
                return Some(href.trim().to_string());
            }
            atom_fallback.get_or_insert(href);
            continue;
        }

        let text = clean_field(inner);
        if !text.is_empty() {
            return Some(text);
        }
    }

    if let Some(href) = atom_fallback {
        return Some(href.trim().to_string());
    }

    let (attrs, inner) = find_tag(block, "guid")?;
    let permalink = attr_value(attrs, "isPermaLink")
        .map(|v| !v.eq_ignore_ascii_case("false"))
        .unwrap_or(true);
    let guid = clean_field(inner);
    if permalink && guid.starts_with("http") {
        Some(guid)
    } else {
        None
    }
}

fn extract_author(block: &str) -> Option<String> {
    if let Some((_, inner)) = find_tag(block, "author") {
        // Atom nests <name>; RSS holds text (often "email (Name)")
        let author = match find_tag(inner, "name") {
            Some((_, name)) => clean_field(name),
            None => clean_field(inner),
        };
        if !author.is_empty() {
            return Some(author);
        }
    }
    field_text(block, "dc:creator").filter(|a| !a.is_empty())
}

/// Parse the date formats feeds use in practice
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    const OFFSET_FORMATS: &[&str] = &[
        "%a, %d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y-%m-%d %H:%M:%S %z",
    ];
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%a, %d %b %Y %H:%M:%S",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc());
        }
    }

    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rss_title_entities_decoded() {
        let xml = r#"<rss><channel><item><title>A &amp; B</title><link>http://x/a</link></item></channel></rss>"#;
        let items = parse_items(xml, "tech").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "A & B");
        assert_eq!(items[0].link, "http://x/a");
        assert_eq!(items[0].category, "tech");
    }

    #[test]
    fn test_rss_fields_and_ordering() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/"><channel>
  <item>
    <title><![CDATA[Older <b>story</b>]]></title>
    <link>https://example.com/older</link>
    <description>&lt;p&gt;Body with &lt;em&gt;markup&lt;/em&gt; &amp;amp; entities&lt;/p&gt;</description>
    <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>
    <dc:creator>Jane Roe</dc:creator>
    <category>Science</category>
  </item>
  <item>
    <title>Newer story</title>
    <link>https://example.com/newer</link>
    <pubDate>Tue, 02 Jan 2024 10:00:00 +0000</pubDate>
  </item>
</channel></rss>"#;

        let items = parse_items(xml, "general").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Newer story");
        assert_eq!(items[1].title, "Older story");
        assert_eq!(items[1].description, "Body with markup & entities");
        assert_eq!(items[1].category, "Science");
        assert_eq!(items[1].pub_date, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_atom_entries() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <title type="html">Atom &lt;i&gt;post&lt;/i&gt;</title>
    <link rel="self" href="https://example.com/self"/>
    <link rel="alternate" href="https://example.com/post"/>
    <summary>Short summary</summary>
    <updated>2024-03-05T12:30:00Z</updated>
    <author><name>Sam</name><email>sam@example.com</email></author>
    <category term="rust"/>
  </entry>
</feed>"#;

        let items = parse_items(xml, "general").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Atom post");
        assert_eq!(items[0].link, "https://example.com/post");
        assert_eq!(items[0].description, "Short summary");
        assert_eq!(items[0].author, "Sam");
        assert_eq!(items[0].category, "rust");
    }

    #[test]
    fn test_malformed_markup_is_tolerated() {
        // Unescaped ampersand, missing closing </item> and truncated document
        let xml = "<rss><channel>
<item><title>First & only</title><link>https://example.com/1</link>
<item><title>Second</title><link>https://example.com/2</link></item>
<item><title>Truncated</title><link>https://example.com/3</li";

        let items = parse_items(xml, "general").unwrap();
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(items.len(), 3);
        assert!(titles.contains(&"First & only"));
        assert!(titles.contains(&"Second"));
        assert!(titles.contains(&"Truncated"));
    }

    #[test]
    fn test_scanned_item_reads_dublin_core_creator() {
        let xml = "<item><title>Fish & chips</title><link>https://e.x/f</link>\
<dc:creator>Jane Roe</dc:creator><category>Food</category></item>";
        let items = parse_items(xml, "general").unwrap();
        assert_eq!(items[0].author, "Jane Roe");
        assert_eq!(items[0].category, "Food");
    }

    #[test]
    fn test_escaped_angle_brackets_survive_as_text() {
        let fields = "<title>Why Vec&lt;T&gt; beats arrays</title><link>https://e.x/vec</link>\
<description>Profit rises when cost &lt;revenue and the remainder of this sentence matters</description>";

        let well_formed = format!("<rss version=\"2.0\"><channel><title>C</title><item>{fields}</item></channel></rss>");
        let bare_item = format!("<item>{fields}</item>");

        for xml in [well_formed, bare_item] {
            let items = parse_items(&xml, "general").unwrap();
            assert_eq!(items.len(), 1, "{xml}");
            assert_eq!(items[0].title, "Why Vec<T> beats arrays");
            assert_eq!(
                items[0].description,
                "Profit rises when cost <revenue and the remainder of this sentence matters"
            );
        }
    }

    #[test]
    fn test_well_formed_feed_prefers_alternate_link_and_content_fallback() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Blog</title>
  <id>urn:blog</id>
  <updated>2024-03-05T12:30:00Z</updated>
  <entry>
    <title>Only content</title>
    <id>urn:entry:1</id>
    <link rel="alternate" href="https://example.com/only"/>
    <updated>2024-03-04T08:00:00Z</updated>
    <content type="html">&lt;p&gt;Full &lt;b&gt;body&lt;/b&gt; text&lt;/p&gt;</content>
  </entry>
</feed>"#;

        let items = parse_items(xml, "general").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link, "https://example.com/only");
        assert_eq!(items[0].description, "Full body text");
        assert_eq!(items[0].category, "general");
        assert_eq!(items[0].pub_date, Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_items_without_title_and_link_are_dropped() {
        let xml = "<rss><item><description>orphan</description></item>\
<item><title>Kept</title></item></rss>";
        let items = parse_items(xml, "general").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Kept");
        assert!(items[0].link.is_empty());
    }

    #[test]
    fn test_unparsable_date_defaults_to_now() {
        let before = Utc::now();
        let xml = "<rss><item><title>T</title><link>https://e.x/1</link>\
<pubDate>sometime last week</pubDate></item></rss>";
        let items = parse_items(xml, "general").unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].pub_date >= before);
    }

    #[test]
    fn test_guid_permalink_fallback() {
        let xml = r#"<rss><item><title>T</title><guid isPermaLink="true">https://e.x/guid</guid></item></rss>"#;
        let items = parse_items(xml, "general").unwrap();
        assert_eq!(items[0].link, "https://e.x/guid");
    }

    #[test]
    fn test_non_feed_document_is_parse_error() {
        assert!(parse_items("<html><body>Not a feed</body></html>", "g").is_err());
        assert!(parse_items("<rss><channel></channel></rss>", "g").unwrap().is_empty());
    }

    #[test]
    fn test_parse_date_variants() {
        assert!(parse_date("Tue, 02 Jan 2024 10:00:00 GMT").is_some());
        assert!(parse_date("2024-01-02T10:00:00+02:00").is_some());
        assert!(parse_date("2024-01-02 10:00:00").is_some());
        assert!(parse_date("2024-01-02").is_some());
        assert!(parse_date("yesterday").is_none());
    }
}
