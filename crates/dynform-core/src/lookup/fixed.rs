//! Lookup service answering from a fixed table of option payloads.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use super::{LookupError, LookupResult, LookupService};
use crate::models::{OptionEntry, OptionsRequest, OptionsResponse};

/// Field key → raw `options` payload. Unknown fields fail like an
/// unreachable endpoint would.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticLookupService {
    payloads: BTreeMap<String, Value>,
}

impl StaticLookupService {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_options(mut self, key: impl Into<String>, options: &[OptionEntry]) -> Self {
        self.payloads
            .insert(key.into(), OptionsResponse::from_entries(options).options);
        self
    }

    /// Register a raw payload, which need not be a list.
    #[must_use]
    pub fn with_payload(mut self, key: impl Into<String>, payload: Value) -> Self {
        self.payloads.insert(key.into(), payload);
        self
    }

    /// Parse `{"field": [{"label": ..., "value": ...}], ...}`.
    pub fn from_json_str(raw: &str) -> crate::Result<Self> {
        let payloads = serde_json::from_str::<BTreeMap<String, Value>>(raw)?;
        Ok(Self { payloads })
    }

    pub fn from_path(path: &Path) -> crate::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.payloads.keys().map(String::as_str)
    }
}

#[async_trait]
impl LookupService for StaticLookupService {
    async fn fetch_options(
        &self,
        request: OptionsRequest,
        _component_name: &str,
    ) -> LookupResult<OptionsResponse> {
        self.payloads
            .get(&request.config_name)
            .cloned()
            .map(|options| OptionsResponse { options })
            .ok_or_else(|| {
                LookupError::Api(format!(
                    "no options registered for '{}'",
                    request.config_name
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::models::ConfigValues;

    fn request(key: &str) -> OptionsRequest {
        OptionsRequest {
            config_name: key.to_string(),
            step_name: "step".to_string(),
            configs: ConfigValues::new(),
        }
    }

    #[test]
    fn from_json_str_reads_field_table() {
        let service =
            StaticLookupService::from_json_str(r#"{"b": [{"label": "X", "value": 1}], "c": {}}"#)
                .unwrap();
        assert_eq!(service.keys().collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unknown_field_is_an_error() {
        let service = StaticLookupService::new()
            .with_options("b", &[OptionEntry::new("X", json!(1))]);

        let response = service.fetch_options(request("b"), "app").await.unwrap();
        assert_eq!(response.options, json!([{"label": "X", "value": 1}]));
        assert!(service.fetch_options(request("zzz"), "app").await.is_err());
    }
}
