use super::message::Message;

/// Messages to display for `search_term`, newest first.
///
/// An empty term yields every message. Otherwise only messages whose text
/// contains the term, ignoring case, are kept; image-only and pending
/// messages have no text and never match.
pub fn filter_messages<'a>(messages: &'a [Message], search_term: &str) -> Vec<&'a Message> {
    if search_term.is_empty() {
        return messages.iter().collect();
    }
    let needle = search_term.to_lowercase();
    messages
        .iter()
        .filter(|message| {
            message
                .text()
                .map(|text| text.to_lowercase().contains(&needle))
                .unwrap_or(false)
        })
        .collect()
}
