//! Helpers for turning model text into typed values.
//!
//! Models are asked for bare JSON but routinely wrap it in a markdown fence.
//! The fence (and an optional language tag) is tolerated; anything else is
//! handed to `serde_json` as-is and must parse strictly.

use serde::de::DeserializeOwned;

/// Remove one surrounding markdown code fence, if present.
///
/// ```
/// use cc_agent::response::strip_code_fence;
///
/// assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
/// assert_eq!(strip_code_fence("  [1, 2] "), "[1, 2]");
/// ```
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Skip the language tag on the opening line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };

    let body = match body.rfind("```") {
        Some(close) => &body[..close],
        None => body,
    };

    body.trim()
}

/// Strictly parse a JSON value out of model text.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(strip_code_fence(text))
}

/// Shorten model output for log and error messages.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
