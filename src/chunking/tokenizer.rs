//! Token counting for window budgets.
//!
//! A run uses exactly one counter: it is chosen when the splitter is built
//! and shared by every fragment of the document.

use crate::error::{FallaxError, Result};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tiktoken_rs::CoreBPE;

/// Counts tokens in a piece of text.
pub trait TokenCounter: Send + Sync {
    /// Number of tokens in `text`. Must be deterministic.
    fn count_tokens(&self, text: &str) -> usize;

    /// Name of the vocabulary, for logs.
    fn name(&self) -> &str;
}

/// Available tokenizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    /// BPE vocabulary used by GPT-3.5/GPT-4 class models.
    #[default]
    Cl100kBase,
    /// Older BPE vocabulary used by Codex/davinci models.
    P50kBase,
    /// Whitespace-separated words. Offline, no vocabulary download.
    Whitespace,
}

impl std::str::FromStr for TokenizerKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cl100k_base" | "cl100k" => Ok(TokenizerKind::Cl100kBase),
            "p50k_base" | "p50k" => Ok(TokenizerKind::P50kBase),
            "whitespace" | "words" => Ok(TokenizerKind::Whitespace),
            _ => Err(format!("Unknown tokenizer: {}", s)),
        }
    }
}

impl std::fmt::Display for TokenizerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenizerKind::Cl100kBase => write!(f, "cl100k_base"),
            TokenizerKind::P50kBase => write!(f, "p50k_base"),
            TokenizerKind::Whitespace => write!(f, "whitespace"),
        }
    }
}

/// BPE token counter backed by tiktoken vocabularies.
pub struct BpeTokenCounter {
    name: &'static str,
    bpe: Mutex<CoreBPE>,
}

impl BpeTokenCounter {
    pub fn cl100k_base() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| FallaxError::Tokenizer(e.to_string()))?;
        Ok(Self {
            name: "cl100k_base",
            bpe: Mutex::new(bpe),
        })
    }

    pub fn p50k_base() -> Result<Self> {
        let bpe = tiktoken_rs::p50k_base().map_err(|e| FallaxError::Tokenizer(e.to_string()))?;
        Ok(Self {
            name: "p50k_base",
            bpe: Mutex::new(bpe),
        })
    }
}

impl TokenCounter for BpeTokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let bpe = match self.bpe.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        bpe.encode_ordinary(text).len()
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Counts whitespace-separated words.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespaceTokenCounter;

impl TokenCounter for WhitespaceTokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn name(&self) -> &str {
        "whitespace"
    }
}

/// Create a token counter of the given kind.
pub fn create_token_counter(kind: TokenizerKind) -> Result<Arc<dyn TokenCounter>> {
    Ok(match kind {
        TokenizerKind::Cl100kBase => Arc::new(BpeTokenCounter::cl100k_base()?),
        TokenizerKind::P50kBase => Arc::new(BpeTokenCounter::p50k_base()?),
        TokenizerKind::Whitespace => Arc::new(WhitespaceTokenCounter),
    })
}
