//! Transcript chunking: fragments, speakers and sliding context windows.
//!
//! A transcript is split into ordered [`Fragment`]s (see [`FragmentSplitter`]),
//! each tagged with a speaker and exact character offsets, and then grouped
//! into overlapping, token-bounded [`Window`]s by the [`SlidingWindowGrouper`].

mod splitter;
mod tokenizer;
mod window;

pub use splitter::{
    FixedSpeaker, FragmentSplitter, LabelPrefixSpeaker, ParagraphSplit, RawFragment,
    SentenceSplit, SpeakerStrategy, SplitDocument, SplitStrategy,
};
pub use tokenizer::{create_token_counter, BpeTokenCounter, TokenCounter, TokenizerKind, WhitespaceTokenCounter};
pub use window::{GrouperConfig, SlidingWindowGrouper, Window};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Who said a fragment.
///
/// Fragments attributed to [`Speaker::NonSubstantive`] (filler, cross-talk,
/// unlabeled text) are never judged; they only serve as context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Speaker {
    Named(String),
    NonSubstantive,
}

impl Speaker {
    /// Slug used for non-substantive fragments in persisted results.
    pub const NON_SUBSTANTIVE_SLUG: &'static str = "other";

    pub fn named(label: impl Into<String>) -> Self {
        Speaker::Named(label.into())
    }

    /// The label written to results.
    pub fn slug(&self) -> &str {
        match self {
            Speaker::Named(name) => name,
            Speaker::NonSubstantive => Self::NON_SUBSTANTIVE_SLUG,
        }
    }

    pub fn is_substantive(&self) -> bool {
        matches!(self, Speaker::Named(_))
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl From<&str> for Speaker {
    fn from(slug: &str) -> Self {
        if slug == Self::NON_SUBSTANTIVE_SLUG {
            Speaker::NonSubstantive
        } else {
            Speaker::Named(slug.to_string())
        }
    }
}

impl Serialize for Speaker {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.slug())
    }
}

impl<'de> Deserialize<'de> for Speaker {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let slug = String::deserialize(deserializer)?;
        Ok(Speaker::from(slug.as_str()))
    }
}

/// The smallest unit of split text.
///
/// `start_char..end_char` is the fragment's span in the split document,
/// counted in characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub speaker: Speaker,
    pub text: String,
    pub token_length: usize,
    pub start_char: usize,
    pub end_char: usize,
}
