//! Dropdown option models and the lookup wire format

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ConfigValues;

/// One selectable dropdown entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionEntry {
    pub label: String,
    pub value: Value,
}

impl OptionEntry {
    pub fn new(label: impl Into<String>, value: Value) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Request sent to the lookup service for one dropdown field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsRequest {
    pub config_name: String,
    pub step_name: String,
    pub configs: ConfigValues,
}

/// Lookup response. `options` is kept raw so a non-list payload can be
/// reported instead of failing to decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsResponse {
    #[serde(default)]
    pub options: Value,
}

impl OptionsResponse {
    /// Response carrying a proper option list
    pub fn from_entries(entries: &[OptionEntry]) -> Self {
        Self {
            options: serde_json::to_value(entries).unwrap_or_else(|_| Value::Array(Vec::new())),
        }
    }
}
