//! OpenAI-compatible client configuration.
//!
//! The analyzer talks to any endpoint that speaks the chat-completions API
//! (OpenAI itself, a LiteLLM proxy, LM Studio, ...), so the base URL and key
//! are configurable.

use crate::error::{FallaxError, Result};
use async_openai::{config::OpenAIConfig, Client};
use backoff::ExponentialBackoffBuilder;
use std::time::Duration;

/// Default timeout for model requests (2 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Create a client with an optional custom base URL and a request timeout.
///
/// The API key is read from `OPENAI_API_KEY`; local endpoints that do not
/// check keys work with it unset.
///
/// Client-side retries are disabled. A rate-limited or failing request
/// comes back as an error right away so the batch failure breaker sees it.
pub fn create_client_with(api_base: Option<&str>, timeout: Duration) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| FallaxError::Config(format!("Failed to create HTTP client: {}", e)))?;

    let mut config = OpenAIConfig::default();
    if let Some(base) = api_base.filter(|b| !b.is_empty()) {
        config = config.with_api_base(base);
    }
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        config = config.with_api_key(key);
    }

    Ok(Client::with_config(config)
        .with_http_client(http_client)
        .with_backoff(no_retry_backoff()))
}

/// Backoff policy that gives up after the first transient error.
fn no_retry_backoff() -> backoff::ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build()
}

/// Whether an API key is present in the environment.
pub fn is_api_key_configured() -> bool {
    std::env::var(API_KEY_ENV).is_ok_and(|k| !k.is_empty())
}
