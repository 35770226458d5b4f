//! Deterministic text used whenever AI output is missing or rejected.

use crate::text::word_count;

const ESSENCE_FILLER: &[&str] = &[
    "The full piece is available from the original source linked below.",
    "Open the source article for the complete details, context and quotes.",
    "This entry was collected automatically from the feed and will stay available for the configured retention period.",
];

const REACTION_FILLER: &str = " Read the original article to see the full details.";

/// Summary template referencing the item title and feed name, padded to at
/// least `min_words` words.
pub fn essence(title: &str, feed_name: &str, min_words: usize) -> String {
    let mut text = format!(
        "{feed_name} published a new story titled \"{title}\". \
The original article did not include enough text for a detailed summary, \
so here is a short pointer instead. \
It covers \"{title}\" as reported by {feed_name}."
    );

    let mut filler = ESSENCE_FILLER.iter().cycle();
    while word_count(&text) < min_words {
        if let Some(sentence) = filler.next() {
            text.push(' ');
            text.push_str(sentence);
        }
    }
    text
}

/// The three templated reactions, each at least `min_chars` long
pub fn reactions(title: &str, feed_name: &str, min_chars: usize) -> [String; 3] {
    [
        format!("Worth a closer look: \"{title}\" could change how readers of {feed_name} think about the topic."),
        format!("The story from {feed_name} leaves open questions about what \"{title}\" means in practice."),
        format!("A useful follow-up would compare \"{title}\" with earlier coverage from other outlets."),
    ]
    .map(|reaction| pad_to_chars(reaction, min_chars))
}

fn pad_to_chars(mut text: String, min_chars: usize) -> String {
    while text.chars().count() < min_chars {
        text.push_str(REACTION_FILLER);
    }
    text
}
