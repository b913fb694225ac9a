//! Shared utility functions used across multiple modules.

use serde_json::Value;

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Whether a control value counts as "not provided" for the required check.
///
/// `null`, the empty string and the empty array are all missing.
pub fn is_missing_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Compare a control value against an option value.
///
/// JSON equality, plus numeric equality between numbers and numeric strings
/// so that `"1"` and `"1.0"` select the option whose value is `1`.
pub fn option_value_matches(current: &Value, option: &Value) -> bool {
    if current == option {
        return true;
    }
    match (current, option) {
        (Value::String(text), Value::Number(number))
        | (Value::Number(number), Value::String(text)) => text
            .trim()
            .parse::<f64>()
            .ok()
            .zip(number.as_f64())
            .is_some_and(|(parsed, number)| parsed == number),
        _ => false,
    }
}
