//! Recover one JSON object from free-form agent output.
//!
//! Priority order:
//! 1. the first fenced block (```` ```json ```` or bare ```` ``` ````) whose
//!    body is a brace-delimited object,
//! 2. the span from the first `{` to the last `}` anywhere in the text,
//! 3. the whole text, unchanged.
//!
//! Extraction never fails; whether the result decodes is the caller's
//! concern.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

static FENCED_OBJECT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").ok());

/// Return the most likely JSON payload inside `text`.
pub fn extract_payload(text: &str) -> &str {
    if let Some(fenced) = fenced_object(text) {
        return fenced;
    }
    if let Some(span) = brace_span(text) {
        return span;
    }
    text
}

/// Extract, then decode into `T`.
pub fn decode_payload<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(extract_payload(text))
}

fn fenced_object(text: &str) -> Option<&str> {
    let pattern = FENCED_OBJECT.as_ref()?;
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
