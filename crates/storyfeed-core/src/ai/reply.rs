/// Parses a raw model reply into a typed result.
///
/// `None` means the reply is unusable and the gateway should try the next
/// provider.
pub trait FromReply: Sized {
    fn from_reply(reply: &str) -> Option<Self>;
}

impl FromReply for String {
    fn from_reply(reply: &str) -> Option<Self> {
        let trimmed = reply.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

/// The span from the first `{` to the last `}`.
///
/// Models like to wrap JSON in code fences or add a sentence after it; this
/// recovers the object in both cases.
pub fn extract_json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}
