//! Lookup service backed by the component options HTTP endpoint.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{LookupError, LookupResult, LookupService};
use crate::models::{OptionsRequest, OptionsResponse};
use crate::util::{compact_text, is_http_url, normalize_text_option};

#[derive(Clone)]
pub struct HttpLookupService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpLookupService {
    pub fn new(base_url: impl Into<String>) -> LookupResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            client: reqwest::Client::builder().build()?,
        })
    }

    pub fn options_url(&self, component_name: &str) -> String {
        format!(
            "{}/v1/components/{}/options",
            self.base_url,
            urlencoding::encode(component_name)
        )
    }
}

#[async_trait]
impl LookupService for HttpLookupService {
    async fn fetch_options(
        &self,
        request: OptionsRequest,
        component_name: &str,
    ) -> LookupResult<OptionsResponse> {
        let response = self
            .client
            .post(self.options_url(component_name))
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LookupError::Api(parse_api_error(status, &body)));
        }

        let body = response.text().await?;
        serde_json::from_str::<OptionsResponse>(&body)
            .map_err(|error| LookupError::InvalidPayload(error.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct LookupErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<LookupErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> LookupResult<String> {
    let base_url = normalize_text_option(Some(raw)).ok_or_else(|| {
        LookupError::InvalidConfiguration("base URL must not be empty".to_string())
    })?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(LookupError::InvalidConfiguration(
            "base URL must include http:// or https://".to_string(),
        ))
    }
}
