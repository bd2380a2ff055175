//! Error types for Fallax.

use thiserror::Error;

/// Library-level error type for Fallax operations.
#[derive(Error, Debug)]
pub enum FallaxError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The configured split strategy could not partition the input text.
    #[error("Split failed: {0}")]
    Split(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// A single window's model call failed (transport, timeout or backend error).
    #[error("Analysis failed: {0}")]
    Analysis(String),

    /// Results could not be persisted.
    #[error("Result sink error: {0}")]
    Sink(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Transcript error: {0}")]
    Transcript(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Fallax operations.
pub type Result<T> = std::result::Result<T, FallaxError>;
