//! Configuration descriptor model

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Key → value mapping of a form. Keys are kept sorted, so equality is
/// structural and independent of insertion order.
pub type ConfigValues = serde_json::Map<String, Value>;

/// Input kind of a configuration field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputType {
    /// Single-line text
    #[serde(alias = "TEXT")]
    ShortText,
    /// Multi-line text
    LongText,
    /// Numeric input
    Number,
    /// Boolean toggle
    Checkbox,
    /// Options resolved remotely from sibling values
    Dropdown,
    /// Reference to an OAuth2 credential
    #[serde(rename = "OAUTH2")]
    Oauth2,
    /// Free-form key/value pairs
    Dictionary,
    /// Raw JSON
    Json,
}

/// Declarative description of one configuration field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDescriptor {
    /// Unique key within a form
    pub key: String,
    /// Display label
    #[serde(default)]
    pub label: String,
    /// Input kind
    #[serde(rename = "type")]
    pub input_type: InputType,
    /// Whether the field must always be present
    #[serde(default)]
    pub required: bool,
    /// Current value. `None` means absent, which differs from an explicit `null`.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,
    /// Optional help text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ConfigDescriptor {
    /// Create an optional descriptor without a value
    #[must_use]
    pub fn new(key: impl Into<String>, label: impl Into<String>, input_type: InputType) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            input_type,
            required: false,
            value: None,
            description: None,
        }
    }

    /// Mark the descriptor as required
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attach a value
    #[must_use]
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn is_dropdown(&self) -> bool {
        self.input_type == InputType::Dropdown
    }

    /// An optional descriptor with a value is shown without user action.
    pub const fn has_value(&self) -> bool {
        self.value.is_some()
    }
}

/// Starting mapping of a descriptor set: every present value keyed by its
/// descriptor, regardless of required/optional status.
pub fn initial_values(descriptors: &[ConfigDescriptor]) -> ConfigValues {
    descriptors
        .iter()
        .filter_map(|descriptor| {
            descriptor
                .value
                .clone()
                .map(|value| (descriptor.key.clone(), value))
        })
        .collect()
}

/// Reject blank and duplicate keys.
pub fn validate_descriptors(descriptors: &[ConfigDescriptor]) -> Result<()> {
    let mut seen = HashSet::new();
    for descriptor in descriptors {
        if descriptor.key.trim().is_empty() {
            return Err(Error::InvalidDescriptors(
                "descriptor key must not be empty".to_string(),
            ));
        }
        if !seen.insert(descriptor.key.as_str()) {
            return Err(Error::InvalidDescriptors(format!(
                "duplicate descriptor key '{}'",
                descriptor.key
            )));
        }
    }
    Ok(())
}

fn deserialize_present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}
