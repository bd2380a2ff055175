//! Fallacy analysis of context windows.
//!
//! An [`Analyzer`] judges the anchor fragment of one window against the
//! fallacy catalog; the [`BatchOrchestrator`] drives a whole document's
//! windows through it.

mod batch;
mod openai;
mod parse;

pub use batch::{BatchConfig, BatchOrchestrator, RunOutcome, RunState, DEFAULT_FAILURE_THRESHOLD};
pub use openai::OpenAiAnalyzer;
pub use parse::{parse_response, CandidateDetection, ParsedResponse};

use crate::catalog::FallacyCatalog;
use crate::chunking::{Speaker, Window};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Marker separating context from the fragment under judgment.
pub const ANCHOR_MARKER: &str = "///Final part to analyse///";

/// One reported fallacy in an anchor fragment.
///
/// Serializes to the persisted record shape (`group_idx`, `speaker_slug`,
/// `mistake_slug`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "group_idx")]
    pub window_index: usize,
    #[serde(rename = "speaker_slug")]
    pub speaker: Speaker,
    #[serde(rename = "mistake_slug")]
    pub fallacy_slug: String,
    #[serde(rename = "group_start_char_id")]
    pub window_start_char: usize,
    #[serde(rename = "group_end_char_id")]
    pub window_end_char: usize,
    #[serde(rename = "chunk_start_char_id")]
    pub focus_start_char: usize,
    #[serde(rename = "chunk_end_char_id")]
    pub focus_end_char: usize,
    pub reason: String,
    #[serde(rename = "how_starts", default)]
    pub evidence_start: String,
    #[serde(rename = "how_ends", default)]
    pub evidence_end: String,
}

impl Detection {
    /// Attach a parsed candidate to the window it was found in.
    pub fn from_candidate(window_index: usize, window: &Window<'_>, candidate: CandidateDetection) -> Self {
        let anchor = window.anchor();
        Self {
            window_index,
            speaker: anchor.speaker.clone(),
            fallacy_slug: candidate.mistake_slug,
            window_start_char: window.start_char(),
            window_end_char: window.end_char(),
            focus_start_char: anchor.start_char,
            focus_end_char: anchor.end_char,
            reason: candidate.reason,
            evidence_start: candidate.how_starts,
            evidence_end: candidate.how_ends,
        }
    }
}

/// Result of analyzing one window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowAnalysis {
    pub detections: Vec<Detection>,
    /// The model answered, but not with a usable detections payload.
    /// Such a window yields no detections.
    pub malformed_response: bool,
}

impl WindowAnalysis {
    pub fn found(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            malformed_response: false,
        }
    }

    pub fn malformed() -> Self {
        Self {
            detections: Vec::new(),
            malformed_response: true,
        }
    }
}

/// Judges the anchor fragment of a window for fallacies.
///
/// Implementations must only report fallacies in the anchor fragment and
/// use the preceding fragments purely as context. Transport and backend
/// failures are returned as errors; uninterpretable output is reported as
/// [`WindowAnalysis::malformed`].
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(
        &self,
        window_index: usize,
        window: &Window<'_>,
        catalog: &FallacyCatalog,
    ) -> Result<WindowAnalysis>;
}

/// Render a window as model input: context lines, the marker, then the anchor.
pub fn render_window_text(window: &Window<'_>) -> String {
    let head = window
        .context()
        .iter()
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let last = &window.anchor().text;

    if head.is_empty() {
        format!("{}\n{}", ANCHOR_MARKER, last)
    } else {
        format!("{}\n{}\n{}", head, ANCHOR_MARKER, last)
    }
}
