//! Pipeline orchestrator for Fallax.
//!
//! Coordinates one run from raw transcript text to persisted detections:
//! split, group, analyze, write.

use crate::analysis::{Analyzer, BatchConfig, BatchOrchestrator, OpenAiAnalyzer, RunOutcome};
use crate::catalog::FallacyCatalog;
use crate::chunking::{
    create_token_counter, FixedSpeaker, FragmentSplitter, LabelPrefixSpeaker, ParagraphSplit,
    SentenceSplit, SlidingWindowGrouper, SpeakerStrategy, SplitDocument, SplitStrategy, Window,
};
use crate::config::{Prompts, Settings, SpeakerMode, SplitMode};
use crate::error::Result;
use crate::sink::{create_sink, ResultSink, SinkHandle};
use indicatif::ProgressBar;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// The main orchestrator for the Fallax pipeline.
pub struct Orchestrator {
    splitter: FragmentSplitter,
    grouper: SlidingWindowGrouper,
    catalog: FallacyCatalog,
    analyzer: Arc<dyn Analyzer>,
    sink: Arc<dyn ResultSink>,
    batch: BatchConfig,
    progress: Option<ProgressBar>,
}

/// Summary of one analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub outcome: RunOutcome,
    /// Where the detections were written.
    pub handle: SinkHandle,
    /// Number of fragments the text was split into.
    pub fragments: usize,
    /// Number of windows built from those fragments.
    pub windows: usize,
    /// The normalized text every character offset in `outcome` refers to.
    /// Sentence splitting strips timestamps, so this can differ from the input.
    pub document: String,
}

/// Printable description of a window.
#[derive(Debug, Clone, Serialize)]
pub struct WindowSummary {
    pub index: usize,
    pub first_fragment: usize,
    pub anchor_fragment: usize,
    pub speaker: String,
    pub substantive: bool,
    pub tokens: usize,
    pub start_char: usize,
    pub end_char: usize,
    pub anchor_text: String,
}

impl WindowSummary {
    pub fn from_window(index: usize, window: &Window<'_>) -> Self {
        Self {
            index,
            first_fragment: window.first_index(),
            anchor_fragment: window.anchor_index(),
            speaker: window.speaker().slug().to_string(),
            substantive: window.speaker().is_substantive(),
            tokens: window.token_total(),
            start_char: window.start_char(),
            end_char: window.end_char(),
            anchor_text: window.anchor().text.clone(),
        }
    }
}

/// Build the splitter selected by the `[chunking]` section.
pub fn build_splitter(settings: &Settings) -> Result<FragmentSplitter> {
    let chunking = &settings.chunking;

    let split: Box<dyn SplitStrategy> = match chunking.split {
        SplitMode::Paragraph => Box::new(ParagraphSplit::new()),
        SplitMode::Sentence => Box::new(SentenceSplit::new()),
    };

    let speaker: Box<dyn SpeakerStrategy> = match chunking.speakers {
        SpeakerMode::Fixed => Box::new(FixedSpeaker::new(chunking.speaker_label.clone())),
        SpeakerMode::Label => Box::new(LabelPrefixSpeaker::new(chunking.non_substantive_labels.iter())),
    };

    let tokenizer = create_token_counter(chunking.tokenizer)?;

    Ok(FragmentSplitter::new(split, speaker, tokenizer))
}

/// Load the catalog file if one is configured, else the preset.
pub fn load_catalog(settings: &Settings) -> Result<FallacyCatalog> {
    match settings.catalog.path.as_deref().filter(|p| !p.is_empty()) {
        Some(path) => FallacyCatalog::load(&Settings::expand_path(path)),
        None => Ok(FallacyCatalog::preset(settings.catalog.preset)),
    }
}

impl Orchestrator {
    /// Create an orchestrator from settings, with the OpenAI analyzer and
    /// the configured sink.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;

        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let analyzer = Arc::new(OpenAiAnalyzer::from_settings(&settings.llm, prompts)?);

        info!(
            "Using {} ({:?} split, {} tokenizer)",
            settings.llm.model, settings.chunking.split, settings.chunking.tokenizer
        );

        Ok(Self {
            splitter: build_splitter(settings)?,
            grouper: SlidingWindowGrouper::new(settings.chunking.grouper_config())?,
            catalog: load_catalog(settings)?,
            analyzer,
            sink: create_sink(settings)?,
            batch: settings.analysis.batch_config(),
            progress: None,
        })
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        splitter: FragmentSplitter,
        grouper: SlidingWindowGrouper,
        catalog: FallacyCatalog,
        analyzer: Arc<dyn Analyzer>,
        sink: Arc<dyn ResultSink>,
        batch: BatchConfig,
    ) -> Self {
        Self {
            splitter,
            grouper,
            catalog,
            analyzer,
            sink,
            batch,
            progress: None,
        }
    }

    /// Report analysis progress on a bar.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Replace the result sink.
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn catalog(&self) -> &FallacyCatalog {
        &self.catalog
    }

    pub fn batch_config(&self) -> &BatchConfig {
        &self.batch
    }

    /// Split text into fragments.
    pub fn split(&self, text: &str) -> Result<SplitDocument> {
        self.splitter.split(text)
    }

    /// Group a split document into windows.
    pub fn group<'a>(&self, document: &'a SplitDocument) -> Vec<Window<'a>> {
        self.grouper.group(&document.fragments)
    }

    /// Split and group without calling the model.
    pub fn preview(&self, text: &str) -> Result<Vec<WindowSummary>> {
        let document = self.split(text)?;
        Ok(self
            .group(&document)
            .iter()
            .enumerate()
            .map(|(idx, w)| WindowSummary::from_window(idx, w))
            .collect())
    }

    /// Analyze a whole text and persist the detections under `prefix`.
    ///
    /// The sink is written even when the run stops early or finds nothing.
    pub async fn analyze_text(&self, text: &str, prefix: &str) -> Result<AnalysisReport> {
        self.analyze_text_with(text, prefix, self.batch.clone()).await
    }

    /// Like [`analyze_text`](Self::analyze_text), with per-run batch limits.
    #[instrument(skip(self, text, batch), fields(chars = text.len()))]
    pub async fn analyze_text_with(
        &self,
        text: &str,
        prefix: &str,
        batch: BatchConfig,
    ) -> Result<AnalysisReport> {
        let document = self.split(text)?;
        let windows = self.group(&document);
        info!(
            "Split into {} fragments, {} windows",
            document.fragments.len(),
            windows.len()
        );

        let mut runner = BatchOrchestrator::new(self.analyzer.clone(), batch);
        if let Some(pb) = &self.progress {
            runner = runner.with_progress(pb.clone());
        }

        let outcome = runner.run(&windows, &self.catalog).await;
        let window_count = windows.len();
        let handle = self.sink.write(&outcome.detections, prefix).await?;

        Ok(AnalysisReport {
            outcome,
            handle,
            fragments: document.fragments.len(),
            windows: window_count,
            document: document.text,
        })
    }
}
