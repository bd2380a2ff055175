//! Report and runs command implementations.

use crate::cli::Output;
use crate::config::Settings;
use crate::sink::{load_handle, SqliteResultSink};
use anyhow::Result;
use std::collections::BTreeMap;

/// Run the report command.
pub fn run_report(handle: &str, json: bool) -> Result<()> {
    let detections = load_handle(handle)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detections)?);
        return Ok(());
    }

    if detections.is_empty() {
        Output::info("No fallacies were detected in this run.");
        return Ok(());
    }

    for detection in &detections {
        Output::detection(detection);
    }

    let mut by_fallacy: BTreeMap<&str, usize> = BTreeMap::new();
    let mut by_speaker: BTreeMap<&str, usize> = BTreeMap::new();
    for d in &detections {
        *by_fallacy.entry(d.fallacy_slug.as_str()).or_default() += 1;
        *by_speaker.entry(d.speaker.slug()).or_default() += 1;
    }

    Output::header(&format!("Detections ({})", detections.len()));
    for (slug, count) in &by_fallacy {
        Output::kv(slug, &count.to_string());
    }
    Output::header("By speaker");
    for (speaker, count) in &by_speaker {
        Output::kv(speaker, &count.to_string());
    }

    Ok(())
}

/// Run the runs command.
pub fn run_runs(settings: &Settings) -> Result<()> {
    let path = settings.sqlite_path();
    if !path.exists() {
        Output::info("No SQLite results yet. Use 'fallax analyze --sink sqlite <input>'.");
        return Ok(());
    }

    let sink = SqliteResultSink::new(&path)?;
    let runs = sink.list_runs()?;

    Output::header(&format!("Stored runs ({})", runs.len()));
    println!();
    for run in &runs {
        Output::list_item(&format!(
            "{} {} ({} detections, {})",
            run.prefix,
            run.id,
            run.detection_count,
            run.created_at.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    if let Some(first) = runs.first() {
        println!();
        Output::info(&format!(
            "Show one with: fallax report sqlite:{}#{}",
            path.display(),
            first.id
        ));
    }

    Ok(())
}
