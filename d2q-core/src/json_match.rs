//! Pull a JSON value out of free-form model output.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::error;

static OBJECT_SPAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());
static ARRAY_SPAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\[.*\]").unwrap());

/// Remove a surrounding markdown code fence (```` ```json ... ``` ````).
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    if !text.starts_with("```") {
        return text;
    }
    let body = match text.find('\n') {
        Some(newline) => &text[newline + 1..],
        None => return "",
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Parse the JSON a model embedded in `text`.
///
/// Tries the whole text (minus a code fence), then the outermost `{...}`
/// span, then the outermost `[...]` span. Returns `None` when none of them
/// parse.
pub fn json_match(text: &str) -> Option<Value> {
    let clean = strip_code_fence(text);
    if clean.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str(clean) {
        return Some(value);
    }

    for span in [&*OBJECT_SPAN, &*ARRAY_SPAN] {
        let parsed = span
            .find(clean)
            .and_then(|found| serde_json::from_str(found.as_str()).ok());
        if parsed.is_some() {
            return parsed;
        }
    }

    let preview: String = text.chars().take(200).collect();
    error!("Could not find JSON in model output: {}...", preview);
    None
}
