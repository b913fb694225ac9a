//! Dropdown option lookup services.

mod fixed;
mod http;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{OptionsRequest, OptionsResponse};

pub use fixed::StaticLookupService;
pub use http::HttpLookupService;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Invalid lookup configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Lookup HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Lookup API error: {0}")]
    Api(String),
    #[error("Invalid lookup payload: {0}")]
    InvalidPayload(String),
}

pub type LookupResult<T> = Result<T, LookupError>;

/// Resolves the option list of one dropdown field from the values of its
/// siblings.
#[async_trait]
pub trait LookupService: Send + Sync {
    async fn fetch_options(
        &self,
        request: OptionsRequest,
        component_name: &str,
    ) -> LookupResult<OptionsResponse>;
}
