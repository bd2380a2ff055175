//! Pre-flight checks before expensive operations.
//!
//! Validates that configuration is usable before starting a run that
//! would otherwise fail on every window.

use crate::config::Settings;
use crate::error::{FallaxError, Result};
use crate::openai::{is_api_key_configured, API_KEY_ENV};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Analysis calls the model.
    Analyze,
    /// Window previews only split text.
    Preview,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    settings.validate()?;

    match operation {
        Operation::Analyze => {
            // Custom endpoints (local servers, proxies) may not need a key.
            let custom_endpoint = settings
                .llm
                .api_base
                .as_deref()
                .is_some_and(|b| !b.is_empty());
            if !custom_endpoint {
                check_api_key()?;
            }
        }
        Operation::Preview => {}
    }
    Ok(())
}

/// Check if the OpenAI API key is configured.
fn check_api_key() -> Result<()> {
    if is_api_key_configured() {
        Ok(())
    } else {
        Err(FallaxError::Config(format!(
            "{} not set. Set it with: export {}='sk-...', or point llm.api_base at a local endpoint",
            API_KEY_ENV, API_KEY_ENV
        )))
    }
}
