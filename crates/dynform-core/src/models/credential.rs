//! Stored credential model

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::InputType;

/// A stored authenticated connection (e.g. an OAuth2 token set).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Display name of the credential
    pub key: String,
    #[serde(rename = "type")]
    pub config_type: InputType,
    /// Token set; carries `access_token` for OAuth2 credentials
    pub value: Value,
}

impl Credential {
    pub fn oauth2(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            config_type: InputType::Oauth2,
            value,
        }
    }

    pub fn is_oauth2(&self) -> bool {
        self.config_type == InputType::Oauth2
    }

    pub fn access_token(&self) -> Option<&str> {
        access_token_of(&self.value)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credential")
            .field("key", &self.key)
            .field("config_type", &self.config_type)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Read the `access_token` field of a credential value.
pub fn access_token_of(value: &Value) -> Option<&str> {
    value.get("access_token").and_then(Value::as_str)
}
