//! Analyzer backed by an OpenAI-compatible chat-completions endpoint.

use super::{parse_response, render_window_text, Analyzer, Detection, ParsedResponse, WindowAnalysis};
use crate::catalog::FallacyCatalog;
use crate::chunking::Window;
use crate::config::{LlmSettings, Prompts};
use crate::error::{FallaxError, Result};
use crate::openai::create_client_with;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// One chat completion per window, checking every catalog entry at once.
pub struct OpenAiAnalyzer {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    prompts: Prompts,
}

impl OpenAiAnalyzer {
    pub fn new(client: Client<OpenAIConfig>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
            temperature: 0.0,
            max_tokens: 256,
            prompts: Prompts::default(),
        }
    }

    /// Build an analyzer from the `[llm]` settings section.
    pub fn from_settings(settings: &LlmSettings, prompts: Prompts) -> Result<Self> {
        let client = create_client_with(
            settings.api_base.as_deref(),
            Duration::from_secs(settings.timeout_seconds),
        )?;

        Ok(Self::new(client, &settings.model)
            .with_temperature(settings.temperature)
            .with_max_tokens(settings.max_tokens)
            .with_prompts(prompts))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Render the system and user messages for a window.
    fn render_messages(&self, window: &Window<'_>, catalog: &FallacyCatalog) -> (String, String) {
        let mut vars = HashMap::new();
        vars.insert("fallacies".to_string(), catalog.render_for_prompt());
        vars.insert("text".to_string(), render_window_text(window));

        (
            self.prompts.render_with_custom(&self.prompts.analysis.system, &vars),
            self.prompts.render_with_custom(&self.prompts.analysis.user, &vars),
        )
    }
}

#[async_trait]
impl Analyzer for OpenAiAnalyzer {
    #[instrument(skip(self, window, catalog), fields(model = %self.model))]
    async fn analyze(
        &self,
        window_index: usize,
        window: &Window<'_>,
        catalog: &FallacyCatalog,
    ) -> Result<WindowAnalysis> {
        let (system_message, user_message) = self.render_messages(window, catalog);

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_message)
                .build()
                .map_err(|e| FallaxError::Analysis(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_message)
                .build()
                .map_err(|e| FallaxError::Analysis(e.to_string()))?
                .into(),
        ];

        #[allow(deprecated)]
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| FallaxError::Analysis(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            FallaxError::Analysis(format!("completion request for window {} failed: {}", window_index, e))
        })?;

        let Some(content) = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
        else {
            warn!("Empty response from model for window {}", window_index);
            return Ok(WindowAnalysis::malformed());
        };

        debug!("Model response for window {}: {}", window_index, content);

        match parse_response(content) {
            ParsedResponse::Detections(candidates) => {
                let detections = candidates
                    .into_iter()
                    .inspect(|c| {
                        if !catalog.contains(&c.mistake_slug) {
                            debug!("Model reported a slug outside the catalog: {}", c.mistake_slug);
                        }
                    })
                    .map(|c| Detection::from_candidate(window_index, window, c))
                    .collect();
                Ok(WindowAnalysis::found(detections))
            }
            ParsedResponse::Malformed(reason) => {
                warn!("Could not parse model output for window {}: {}", window_index, reason);
                Ok(WindowAnalysis::malformed())
            }
        }
    }
}
