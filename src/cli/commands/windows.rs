//! Windows command implementation.

use super::analyze::apply_chunking_args;
use crate::chunking::SlidingWindowGrouper;
use crate::cli::preflight::{self, Operation};
use crate::cli::{ChunkingArgs, Output};
use crate::config::Settings;
use crate::orchestrator::{build_splitter, WindowSummary};
use crate::transcript::load_transcript;
use anyhow::Result;
use std::path::Path;

/// Run the windows command.
pub fn run_windows(input: &str, json: bool, chunking: &ChunkingArgs, mut settings: Settings) -> Result<()> {
    apply_chunking_args(&mut settings, chunking);
    preflight::check(Operation::Preview, &settings)?;

    let text = load_transcript(Path::new(input))?;
    let splitter = build_splitter(&settings)?;
    let grouper = SlidingWindowGrouper::new(settings.chunking.grouper_config())?;

    let document = splitter.split(&text)?;
    let windows: Vec<WindowSummary> = grouper
        .group(&document.fragments)
        .iter()
        .enumerate()
        .map(|(idx, w)| WindowSummary::from_window(idx, w))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&windows)?);
        return Ok(());
    }

    Output::header(&format!(
        "{} fragments, {} windows",
        document.fragments.len(),
        windows.len()
    ));
    println!();
    for window in &windows {
        Output::window(window);
    }

    let skipped = windows.iter().filter(|w| !w.substantive).count();
    println!();
    Output::kv("Tokenizer", splitter.tokenizer().name());
    Output::kv("Non-substantive anchors", &skipped.to_string());

    Ok(())
}
