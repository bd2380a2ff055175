//! Fragment splitting with exact character offsets.
//!
//! The splitter delegates *where* to cut to a [`SplitStrategy`] and *who*
//! spoke to a [`SpeakerStrategy`], then walks the pieces in order with a
//! running cursor to assign each fragment its span in the document.

use super::{Fragment, Speaker, TokenCounter};
use crate::error::{FallaxError, Result};
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// A piece of text produced by a split strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFragment {
    pub text: String,
    /// Characters consumed between this piece and the next one.
    pub separator_len: usize,
}

impl RawFragment {
    pub fn new(text: impl Into<String>, separator_len: usize) -> Self {
        Self {
            text: text.into(),
            separator_len,
        }
    }
}

/// Rule for cutting a document into fragments.
///
/// Concatenating every piece followed by `separator_len` consumed characters
/// must reproduce the (normalized) input exactly.
pub trait SplitStrategy: Send + Sync {
    /// Rewrite the document before splitting. Offsets refer to the result.
    fn normalize<'t>(&self, text: &'t str) -> Cow<'t, str> {
        Cow::Borrowed(text)
    }

    fn split(&self, text: &str) -> Result<Vec<RawFragment>>;
}

/// Rule for attributing a fragment to a speaker.
pub trait SpeakerStrategy: Send + Sync {
    fn speaker_of(&self, fragment: &str) -> Speaker;
}

/// Splits on an exact delimiter, `"\n\n"` by default.
///
/// Empty pieces between repeated delimiters are kept so that offsets stay exact.
#[derive(Debug, Clone)]
pub struct ParagraphSplit {
    delimiter: String,
}

impl ParagraphSplit {
    pub fn new() -> Self {
        Self::with_delimiter("\n\n")
    }

    pub fn with_delimiter(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
        }
    }
}

impl Default for ParagraphSplit {
    fn default() -> Self {
        Self::new()
    }
}

impl SplitStrategy for ParagraphSplit {
    fn split(&self, text: &str) -> Result<Vec<RawFragment>> {
        if self.delimiter.is_empty() {
            return Err(FallaxError::Split("paragraph delimiter must not be empty".to_string()));
        }

        let separator_len = self.delimiter.chars().count();
        Ok(text
            .split(self.delimiter.as_str())
            .map(|piece| RawFragment::new(piece, separator_len))
            .collect())
    }
}

/// Splits after sentence-ending punctuation.
///
/// Inline timestamp markup such as `[12.0s - 15.5s]` is removed and the text
/// trimmed before splitting; the whitespace run after `.`, `!` or `?` is the
/// separator between sentences.
#[derive(Debug, Clone)]
pub struct SentenceSplit {
    timestamps: Regex,
    boundary: Regex,
}

impl SentenceSplit {
    pub fn new() -> Self {
        Self {
            timestamps: Regex::new(r"\[\d+(?:\.\d+)?s\s*-\s*\d+(?:\.\d+)?s\]\s*")
                .expect("timestamp pattern is valid"),
            boundary: Regex::new(r"[.!?](\s+)").expect("boundary pattern is valid"),
        }
    }
}

impl Default for SentenceSplit {
    fn default() -> Self {
        Self::new()
    }
}

impl SplitStrategy for SentenceSplit {
    fn normalize<'t>(&self, text: &'t str) -> Cow<'t, str> {
        let stripped = self.timestamps.replace_all(text, "");
        match stripped {
            Cow::Borrowed(s) => Cow::Borrowed(s.trim()),
            Cow::Owned(s) => Cow::Owned(s.trim().to_string()),
        }
    }

    fn split(&self, text: &str) -> Result<Vec<RawFragment>> {
        let mut pieces = Vec::new();
        let mut last_end = 0;

        for caps in self.boundary.captures_iter(text) {
            let Some(gap) = caps.get(1) else { continue };
            pieces.push(RawFragment::new(
                &text[last_end..gap.start()],
                gap.as_str().chars().count(),
            ));
            last_end = gap.end();
        }

        if last_end < text.len() {
            pieces.push(RawFragment::new(&text[last_end..], 0));
        }

        Ok(pieces)
    }
}

/// Attributes every fragment to the same named speaker.
#[derive(Debug, Clone)]
pub struct FixedSpeaker {
    speaker: Speaker,
}

impl FixedSpeaker {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::named(label),
        }
    }
}

impl Default for FixedSpeaker {
    fn default() -> Self {
        Self::new("speaker")
    }
}

impl SpeakerStrategy for FixedSpeaker {
    fn speaker_of(&self, _fragment: &str) -> Speaker {
        self.speaker.clone()
    }
}

/// Reads a leading `NAME:` label, as in debate and interview transcripts.
///
/// Fragments without a label, or with a label listed as non-substantive
/// (`CROSSTALK`, `UNKNOWN`, ...), are attributed to [`Speaker::NonSubstantive`].
#[derive(Debug, Clone)]
pub struct LabelPrefixSpeaker {
    pattern: Regex,
    non_substantive: HashSet<String>,
}

impl LabelPrefixSpeaker {
    pub fn new<I, S>(non_substantive: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            pattern: Regex::new(r"^\s*(\p{Lu}[\p{L}\p{N} .'\-]{0,40}?)\s*:")
                .expect("speaker label pattern is valid"),
            non_substantive: non_substantive
                .into_iter()
                .map(|label| label.as_ref().trim().to_uppercase())
                .collect(),
        }
    }
}

impl Default for LabelPrefixSpeaker {
    fn default() -> Self {
        Self::new(["CROSSTALK", "UNKNOWN", "UNIDENTIFIED", "INAUDIBLE"])
    }
}

impl SpeakerStrategy for LabelPrefixSpeaker {
    fn speaker_of(&self, fragment: &str) -> Speaker {
        let Some(label) = self.pattern.captures(fragment).and_then(|c| c.get(1)) else {
            return Speaker::NonSubstantive;
        };

        let label = label.as_str().trim();
        if self.non_substantive.contains(&label.to_uppercase()) {
            Speaker::NonSubstantive
        } else {
            Speaker::named(label)
        }
    }
}

/// A document split into fragments.
#[derive(Debug, Clone)]
pub struct SplitDocument {
    /// The normalized text the fragment offsets refer to.
    pub text: String,
    pub fragments: Vec<Fragment>,
}

impl SplitDocument {
    /// Characters `start..end` of the normalized text.
    pub fn slice(&self, start_char: usize, end_char: usize) -> &str {
        let byte_at = |char_idx: usize| {
            self.text
                .char_indices()
                .nth(char_idx)
                .map(|(b, _)| b)
                .unwrap_or(self.text.len())
        };
        let start = byte_at(start_char);
        let end = byte_at(end_char).max(start);
        &self.text[start..end]
    }
}

/// Turns raw text into tokenized, speaker-tagged fragments.
pub struct FragmentSplitter {
    split: Box<dyn SplitStrategy>,
    speaker: Box<dyn SpeakerStrategy>,
    tokenizer: Arc<dyn TokenCounter>,
}

impl FragmentSplitter {
    pub fn new(
        split: Box<dyn SplitStrategy>,
        speaker: Box<dyn SpeakerStrategy>,
        tokenizer: Arc<dyn TokenCounter>,
    ) -> Self {
        Self {
            split,
            speaker,
            tokenizer,
        }
    }

    /// The token counter used for every fragment.
    pub fn tokenizer(&self) -> &dyn TokenCounter {
        self.tokenizer.as_ref()
    }

    /// Split `raw` into fragments with exact character offsets.
    pub fn split(&self, raw: &str) -> Result<SplitDocument> {
        let text = self.split.normalize(raw).into_owned();
        let pieces = self.split.split(&text)?;

        let mut fragments = Vec::with_capacity(pieces.len());
        let mut cursor = 0;

        for piece in pieces {
            let start_char = cursor;
            let end_char = start_char + piece.text.chars().count();
            cursor = end_char + piece.separator_len;

            fragments.push(Fragment {
                speaker: self.speaker.speaker_of(&piece.text),
                token_length: self.tokenizer.count_tokens(&piece.text),
                text: piece.text,
                start_char,
                end_char,
            });
        }

        let total_chars = text.chars().count();
        if let Some(last) = fragments.last() {
            if last.end_char > total_chars {
                return Err(FallaxError::Split(format!(
                    "fragments cover {} characters but the document has {}",
                    last.end_char, total_chars
                )));
            }
        }

        debug!(
            "Split {} characters into {} fragments ({} tokenizer)",
            total_chars,
            fragments.len(),
            self.tokenizer.name()
        );

        Ok(SplitDocument { text, fragments })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::WhitespaceTokenCounter;

    fn splitter(split: impl SplitStrategy + 'static, speaker: impl SpeakerStrategy + 'static) -> FragmentSplitter {
        FragmentSplitter::new(Box::new(split), Box::new(speaker), Arc::new(WhitespaceTokenCounter))
    }

    #[test]
    fn test_paragraph_offsets_round_trip() {
        let text = "First paragraph here.\n\nSecond one — with ünïcode.\n\n\n\nFourth after an empty one.";
        let doc = splitter(ParagraphSplit::new(), FixedSpeaker::default()).split(text).unwrap();

        assert_eq!(doc.fragments.len(), 4);
        assert_eq!(doc.fragments[2].text, "");

        let chars: Vec<char> = text.chars().collect();
        let rebuilt = doc
            .fragments
            .iter()
            .map(|f| chars[f.start_char..f.end_char].iter().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n\n");
        assert_eq!(rebuilt, text);

        for fragment in &doc.fragments {
            assert_eq!(doc.slice(fragment.start_char, fragment.end_char), fragment.text);
        }
    }

    #[test]
    fn test_paragraph_offsets_advance_by_separator() {
        let doc = splitter(ParagraphSplit::new(), FixedSpeaker::default())
            .split("ab\n\ncde")
            .unwrap();

        assert_eq!((doc.fragments[0].start_char, doc.fragments[0].end_char), (0, 2));
        assert_eq!((doc.fragments[1].start_char, doc.fragments[1].end_char), (4, 7));
        assert_eq!(doc.fragments[1].token_length, 1);
    }

    #[test]
    fn test_sentence_split_strips_timestamps() {
        let text = "[0.0s - 4.2s] We will cut taxes.  Everyone knows it! [4.2s - 9.0s] Do you disagree? Fine";
        let doc = splitter(SentenceSplit::new(), FixedSpeaker::default()).split(text).unwrap();

        let texts: Vec<&str> = doc.fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["We will cut taxes.", "Everyone knows it!", "Do you disagree?", "Fine"]
        );
        assert!(!doc.text.contains("[0.0s"));

        for fragment in &doc.fragments {
            assert_eq!(doc.slice(fragment.start_char, fragment.end_char), fragment.text);
        }
        assert_eq!(doc.fragments[1].start_char, doc.fragments[0].end_char + 2);
    }

    #[test]
    fn test_label_prefix_speaker() {
        let speaker = LabelPrefixSpeaker::default();

        assert_eq!(speaker.speaker_of("SMITH: We never said that."), Speaker::named("SMITH"));
        assert_eq!(speaker.speaker_of("Dr. Jones: Let me finish."), Speaker::named("Dr. Jones"));
        assert_eq!(speaker.speaker_of("CROSSTALK: ..."), Speaker::NonSubstantive);
        assert_eq!(speaker.speaker_of("no label here"), Speaker::NonSubstantive);
    }

    struct Refusing;

    impl SplitStrategy for Refusing {
        fn split(&self, _text: &str) -> Result<Vec<RawFragment>> {
            Err(FallaxError::Split("cannot partition".to_string()))
        }
    }

    #[test]
    fn test_strategy_failure_is_split_error() {
        let err = splitter(Refusing, FixedSpeaker::default()).split("anything").unwrap_err();
        assert!(matches!(err, FallaxError::Split(_)));
    }

    #[test]
    fn test_empty_delimiter_rejected() {
        let err = ParagraphSplit::with_delimiter("").split("text").unwrap_err();
        assert!(matches!(err, FallaxError::Split(_)));
    }
}
