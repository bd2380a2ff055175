//! Configuration module for Fallax.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AnalysisPrompts, Prompts};
pub use settings::{
    AnalysisSettings, CatalogSettings, ChunkingSettings, GeneralSettings, LlmSettings,
    PromptSettings, Settings, SinkKind, SinkSettings, SpeakerMode, SplitMode,
};
