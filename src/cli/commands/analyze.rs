//! Analyze command implementation.

use crate::analysis::RunState;
use crate::catalog::CatalogPreset;
use crate::cli::preflight::{self, Operation};
use crate::cli::{AnalyzeArgs, ChunkingArgs, Output};
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::transcript::{default_prefix, load_transcript};
use anyhow::Result;
use std::path::Path;

/// Apply command-line chunking overrides to settings.
pub(crate) fn apply_chunking_args(settings: &mut Settings, args: &ChunkingArgs) {
    if let Some(split) = args.split {
        settings.chunking.split = split;
    }
    if let Some(speakers) = args.speakers {
        settings.chunking.speakers = speakers;
    }
    if let Some(max_tokens) = args.max_tokens {
        settings.chunking.max_tokens = max_tokens;
    }
    if let Some(max_fragments) = args.max_fragments {
        settings.chunking.max_fragments = max_fragments;
    }
}

/// Select a catalog by preset name, or treat the value as a file path.
pub(crate) fn apply_catalog_arg(settings: &mut Settings, catalog: Option<&str>) {
    let Some(name) = catalog else {
        return;
    };
    match name.parse::<CatalogPreset>() {
        Ok(preset) => {
            settings.catalog.preset = preset;
            settings.catalog.path = None;
        }
        Err(_) => settings.catalog.path = Some(name.to_string()),
    }
}

fn apply_analyze_args(settings: &mut Settings, args: &AnalyzeArgs) {
    apply_chunking_args(settings, &args.chunking);
    apply_catalog_arg(settings, args.catalog.as_deref());

    if let Some(max_windows) = args.max_windows {
        settings.analysis.max_windows = max_windows;
    }
    if let Some(pause_ms) = args.pause_ms {
        settings.analysis.pause_ms = pause_ms;
    }
    if let Some(model) = &args.model {
        settings.llm.model = model.clone();
    }
    if let Some(api_base) = &args.api_base {
        settings.llm.api_base = Some(api_base.clone());
    }
    if let Some(sink) = args.sink {
        settings.sink.kind = sink;
    }
}

/// Run the analyze command.
pub async fn run_analyze(args: &AnalyzeArgs, mut settings: Settings) -> Result<()> {
    apply_analyze_args(&mut settings, args);

    if let Err(e) = preflight::check(Operation::Analyze, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let input = Path::new(&args.input);
    let text = load_transcript(input)?;
    let prefix = args.prefix.clone().unwrap_or_else(|| default_prefix(input));

    let mut orchestrator = Orchestrator::from_settings(&settings)?;
    let progress = (!args.json).then(|| Output::progress_bar(0, "Analyzing windows"));
    if let Some(pb) = &progress {
        orchestrator = orchestrator.with_progress(pb.clone());
        Output::info(&format!(
            "Analyzing {} with {} ({} fallacies)",
            args.input,
            settings.llm.model,
            orchestrator.catalog().len()
        ));
    }

    let report = orchestrator.analyze_text(&text, &prefix).await;
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }
    let report = report?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let outcome = &report.outcome;
    for detection in &outcome.detections {
        Output::detection(detection);
    }

    Output::header("Summary");
    Output::kv("Fragments", &report.fragments.to_string());
    Output::kv(
        "Windows",
        &format!("{} of {} processed", outcome.windows_processed, outcome.windows_total),
    );
    Output::kv("Analyzed", &outcome.analyzed.to_string());
    Output::kv("Skipped", &outcome.skipped.to_string());
    Output::kv("Failed", &outcome.failed.to_string());
    Output::kv("Malformed", &outcome.malformed.to_string());
    Output::kv("Detections", &outcome.detections.len().to_string());
    println!();

    match outcome.state {
        RunState::StoppedFailures => Output::warning(&format!(
            "Run stopped after {} consecutive failures. Partial results were saved.",
            orchestrator.batch_config().failure_threshold
        )),
        RunState::StoppedBudget => Output::warning(&format!(
            "Window limit reached ({} of {}). Use --max-windows 0 to analyze everything.",
            outcome.windows_processed, outcome.windows_total
        )),
        RunState::Done | RunState::Running => {}
    }

    Output::success(&format!("Results saved to {}", report.handle));
    Ok(())
}
