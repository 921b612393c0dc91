use crate::core::Value;
use serde_json::Value as JsonValue;
use std::collections::HashSet;

/// Turns a membership filter value into a deduplicated list.
///
/// Collections are deduplicated as-is. Text that looks like a bracketed list
/// is parsed as JSON; anything else is split on commas with blank tokens
/// removed. Any other scalar becomes a one-element list.
pub fn parse_array_parameter(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => dedupe(items),
        Value::Text(text) => parse_text(&text),
        other => vec![other],
    }
}

fn parse_text(text: &str) -> Vec<Value> {
    let trimmed = text.trim();
    if trimmed.starts_with('[')
        && trimmed.ends_with(']')
        && let Ok(JsonValue::Array(items)) = serde_json::from_str::<JsonValue>(trimmed)
    {
        return dedupe(items.into_iter().map(Value::from_json).collect());
    }

    dedupe(
        trimmed
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(Value::from)
            .collect(),
    )
}

/// Removes repeats, keeping the first occurrence of each value.
pub fn dedupe(items: Vec<Value>) -> Vec<Value> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
