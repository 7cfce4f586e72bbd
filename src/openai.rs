//! OpenAI-compatible client configuration.
//!
//! Both the embedding and generation gateways talk to OpenAI-style endpoints.
//! Pointing `api_base` at Groq or a local server swaps the provider without
//! touching the callers.

use crate::error::{CourtsideError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for API requests (2 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Connection parameters for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Base URL, e.g. `https://api.groq.com/openai/v1`. `None` uses OpenAI.
    pub api_base: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
}

impl Endpoint {
    /// Read the API key from the configured environment variable.
    ///
    /// A missing key is not an error here; local servers usually accept any key.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }
}

/// Create a client for the endpoint with the default timeout.
pub fn create_client(endpoint: &Endpoint) -> Result<Client<OpenAIConfig>> {
    create_client_with_timeout(endpoint, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create a client for the endpoint with a custom timeout.
pub fn create_client_with_timeout(
    endpoint: &Endpoint,
    timeout: Duration,
) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CourtsideError::Config(format!("Failed to create HTTP client: {}", e)))?;

    let mut config = OpenAIConfig::new();
    if let Some(base) = &endpoint.api_base {
        config = config.with_api_base(base.trim_end_matches('/'));
    }
    if let Some(key) = endpoint.api_key() {
        config = config.with_api_key(key);
    }

    Ok(Client::with_config(config).with_http_client(http_client))
}
