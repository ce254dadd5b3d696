//! Context enrichment for matching a short reply to an open question
//! (§6.4): when the conversation is `awaiting_response` and the new
//! input is short, concatenate `last_question` onto it so the matcher
//! sees "Which doctor? Dr. Smith" instead of bare "Dr. Smith". Enrichment
//! only ever feeds the matcher - turn history and rendering always use
//! the raw input.

/// The text to hand the cascade matcher: `raw_input` enriched with
/// `last_question` when the conversation is waiting on a reply and the
/// reply is short, otherwise `raw_input` unchanged.
pub fn enrich_for_matching(
    awaiting_response: bool,
    last_question: Option<&str>,
    raw_input: &str,
    token_threshold: usize,
) -> String {
    if !awaiting_response {
        return raw_input.to_string();
    }
    let Some(question) = last_question else {
        return raw_input.to_string();
    };
    if raw_input.split_whitespace().count() >= token_threshold {
        return raw_input.to_string();
    }
    format!("{question} {raw_input}")
}
