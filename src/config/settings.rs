//! Configuration settings for Fallax.

use crate::analysis::{BatchConfig, DEFAULT_FAILURE_THRESHOLD};
use crate::catalog::CatalogPreset;
use crate::chunking::{GrouperConfig, TokenizerKind};
use crate::error::{FallaxError, Result};
use crate::openai::DEFAULT_TIMEOUT_SECS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub llm: LlmSettings,
    pub chunking: ChunkingSettings,
    pub analysis: AnalysisSettings,
    pub catalog: CatalogSettings,
    pub sink: SinkSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.fallax".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Model endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Chat model used for analysis.
    pub model: String,
    /// Base URL of an OpenAI-compatible endpoint (None = api.openai.com).
    pub api_base: Option<String>,
    pub temperature: f32,
    /// Maximum tokens in the model's answer.
    pub max_tokens: u32,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_base: None,
            temperature: 0.0,
            max_tokens: 256,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// How fragments are cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    /// Paragraphs separated by a blank line.
    Paragraph,
    /// Sentences, with inline timestamps removed.
    #[default]
    Sentence,
}

impl std::str::FromStr for SplitMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "paragraph" => Ok(SplitMode::Paragraph),
            "sentence" => Ok(SplitMode::Sentence),
            _ => Err(format!("Unknown split mode: {}", s)),
        }
    }
}

/// How fragments are attributed to speakers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerMode {
    /// One label for the whole transcript.
    #[default]
    Fixed,
    /// Leading `NAME:` labels.
    Label,
}

impl std::str::FromStr for SpeakerMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(SpeakerMode::Fixed),
            "label" | "prefix" => Ok(SpeakerMode::Label),
            _ => Err(format!("Unknown speaker mode: {}", s)),
        }
    }
}

/// Fragment splitting and window grouping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub split: SplitMode,
    pub speakers: SpeakerMode,
    /// Label used by the fixed speaker mode.
    pub speaker_label: String,
    /// Labels treated as filler or cross-talk by the label speaker mode.
    pub non_substantive_labels: Vec<String>,
    pub tokenizer: TokenizerKind,
    /// Token budget per window.
    pub max_tokens: usize,
    /// Maximum fragments per window.
    pub max_fragments: usize,
    /// First fragment that may anchor a window.
    pub window_start: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            split: SplitMode::Sentence,
            speakers: SpeakerMode::Fixed,
            speaker_label: "speaker".to_string(),
            non_substantive_labels: ["CROSSTALK", "UNKNOWN", "UNIDENTIFIED", "INAUDIBLE"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            tokenizer: TokenizerKind::Cl100kBase,
            max_tokens: 4000,
            max_fragments: 8,
            window_start: 1,
        }
    }
}

impl ChunkingSettings {
    pub fn grouper_config(&self) -> GrouperConfig {
        GrouperConfig {
            max_tokens: self.max_tokens,
            max_fragments: self.max_fragments,
            window_start: self.window_start,
        }
    }
}

/// Batch analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Maximum windows analyzed per run (0 = no limit).
    pub max_windows: usize,
    /// Pause between model calls in milliseconds.
    pub pause_ms: u64,
    /// Consecutive failures that stop a run.
    pub failure_threshold: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            max_windows: 20,
            pause_ms: 300,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

impl AnalysisSettings {
    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            max_windows: (self.max_windows > 0).then_some(self.max_windows),
            pause: Duration::from_millis(self.pause_ms),
            failure_threshold: self.failure_threshold,
        }
    }
}

/// Fallacy catalog selection.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CatalogSettings {
    /// Built-in catalog (short, extended).
    pub preset: CatalogPreset,
    /// Path to a TOML catalog file (overrides the preset).
    pub path: Option<String>,
}

/// Where results are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Json,
    Sqlite,
}

impl std::str::FromStr for SinkKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(SinkKind::Json),
            "sqlite" => Ok(SinkKind::Sqlite),
            _ => Err(format!("Unknown sink: {}", s)),
        }
    }
}

/// Result sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkSettings {
    pub kind: SinkKind,
    /// Directory for JSON result files.
    pub results_dir: String,
    /// SQLite database for the sqlite sink.
    pub sqlite_path: String,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            kind: SinkKind::Json,
            results_dir: "~/.fallax/results".to_string(),
            sqlite_path: "~/.fallax/results.db".to_string(),
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| FallaxError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check values that would make a run meaningless.
    pub fn validate(&self) -> Result<()> {
        self.chunking.grouper_config().validate()?;

        if self.analysis.failure_threshold == 0 {
            return Err(FallaxError::Config("analysis.failure_threshold must be at least 1".to_string()));
        }

        if let Some(base) = self.llm.api_base.as_deref().filter(|b| !b.is_empty()) {
            url::Url::parse(base)
                .map_err(|e| FallaxError::Config(format!("llm.api_base '{}' is not a valid URL: {}", base, e)))?;
        }

        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fallax")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded results directory path.
    pub fn results_dir(&self) -> PathBuf {
        Self::expand_path(&self.sink.results_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.sink.sqlite_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.analysis.batch_config().max_windows, Some(20));
        assert_eq!(settings.analysis.batch_config().failure_threshold, 5);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [llm]
            model = "local-model"
            api_base = "http://localhost:1234/v1"

            [chunking]
            split = "paragraph"
            speakers = "label"
            tokenizer = "whitespace"

            [analysis]
            max_windows = 0
            "#,
        )
        .unwrap();

        assert_eq!(settings.llm.model, "local-model");
        assert_eq!(settings.llm.max_tokens, 256);
        assert_eq!(settings.chunking.split, SplitMode::Paragraph);
        assert_eq!(settings.chunking.speakers, SpeakerMode::Label);
        assert_eq!(settings.chunking.tokenizer, TokenizerKind::Whitespace);
        assert_eq!(settings.chunking.max_fragments, 8);
        assert_eq!(settings.analysis.batch_config().max_windows, None);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.chunking.max_fragments = 1;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.llm.api_base = Some("not a url".to_string());
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.analysis.failure_threshold = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.llm.model = "gpt-4.1".to_string();
        settings.sink.kind = SinkKind::Sqlite;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.llm.model, "gpt-4.1");
        assert_eq!(loaded.sink.kind, SinkKind::Sqlite);
    }
}
