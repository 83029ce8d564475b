//! Text-generation collaborator and tolerant JSON extraction.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// A single-shot text-generation call.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn send(&self, prompt: &str) -> Result<String>;
}

/// Pull a JSON array of objects out of free-form model output.
///
/// Tries, in order: the whole text as an array, the whole text as an object
/// wrapping an array (under `tasks`, else its first array field), a fenced
/// code block, and the span between the first `[` and the last `]`.
pub fn extract_json_array(text: &str) -> Option<Vec<Value>> {
    let trimmed = text.trim();

    if let Some(items) = parse_array(trimmed) {
        return Some(items);
    }

    if let Some(block) = fenced_block(trimmed) {
        if let Some(items) = parse_array(block) {
            return Some(items);
        }
    }

    let start = trimmed.find('[')?;
    let end = trimmed.rfind(']')?;
    if end <= start {
        return None;
    }
    parse_array(&trimmed[start..=end])
}

fn parse_array(text: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => {
            if let Some(Value::Array(items)) = map.remove("tasks") {
                return Some(items);
            }
            map.into_iter().find_map(|(_, v)| match v {
                Value::Array(items) => Some(items),
                _ => None,
            })
        }
        _ => None,
    }
}

/// Body of the first ``` fenced block, with an optional `json` tag removed.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let rest = &text[start + 3..];
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}
