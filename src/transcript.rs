//! Transcript input.
//!
//! Plain text is used as-is. JSON transcripts with timed segments are
//! rendered one segment per line as `[12.0s - 17.5s] text`; the sentence
//! splitter strips those stamps again.

use crate::error::{FallaxError, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// A timed piece of a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl TranscriptSegment {
    pub fn render(&self) -> String {
        format!(
            "[{:.1}s - {:.1}s] {}",
            self.start_seconds,
            self.end_seconds,
            self.text.trim()
        )
    }
}

#[derive(Debug, Deserialize)]
struct SegmentFile {
    segments: Vec<TranscriptSegment>,
}

/// Render timed segments as text, one line per segment.
pub fn render_segments(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .filter(|s| !s.text.trim().is_empty())
        .map(TranscriptSegment::render)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse the contents of a JSON segment file.
pub fn parse_segments_json(content: &str) -> Result<Vec<TranscriptSegment>> {
    let file: SegmentFile = serde_json::from_str(content)
        .map_err(|e| FallaxError::Transcript(format!("invalid segment file: {}", e)))?;
    Ok(file.segments)
}

/// Load a transcript from a path, or from stdin when the path is `-`.
pub fn load_transcript(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }

    if !path.exists() {
        return Err(FallaxError::Transcript(format!(
            "file not found: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        Ok(render_segments(&parse_segments_json(&content)?))
    } else {
        Ok(content)
    }
}

/// Default result prefix for a transcript path.
pub fn default_prefix(path: &Path) -> String {
    match path.file_stem().and_then(|s| s.to_str()) {
        Some(stem) if path.as_os_str() != "-" => format!("analysis-{}", stem),
        _ => "analysis-stdin".to_string(),
    }
}
