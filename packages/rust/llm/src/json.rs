//! JSON extraction from model replies.
//!
//! Models wrap JSON in Markdown fences or surround it with commentary.
//! We unwrap a fence if present, then isolate the first balanced object.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use crate::error::GenerationError;

/// Find the first balanced JSON object in `raw`.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("valid regex")
    });

    let body = FENCE_RE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|inner| inner.contains('{'))
        .unwrap_or(raw);

    balanced_object(body)
}

/// Extract and deserialize the JSON object in a reply.
pub fn parse_json_reply<T: DeserializeOwned>(
    raw: &str,
    task: &'static str,
) -> Result<T, GenerationError> {
    let json = extract_json_object(raw).ok_or_else(|| GenerationError::Malformed {
        task,
        reason: format!("no JSON object in reply (got: {})", preview(raw)),
    })?;

    serde_json::from_str(json).map_err(|e| GenerationError::Malformed {
        task,
        reason: format!("{e} (got: {})", preview(json)),
    })
}

/// Scan from the first `{` to its matching `}`, ignoring braces in strings.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

fn preview(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(200) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
