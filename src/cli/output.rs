//! CLI output formatting utilities.

use crate::analysis::Detection;
use crate::orchestrator::WindowSummary;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print one detection.
    pub fn detection(d: &Detection) {
        println!(
            "\n{} {} by {} (window {}, chars {}-{})",
            style(">>").green(),
            style(&d.fallacy_slug).bold(),
            style(d.speaker.slug()).cyan(),
            d.window_index,
            d.focus_start_char,
            d.focus_end_char
        );
        println!("   {}", content_preview(&d.reason, 200));
        if !d.evidence_start.is_empty() || !d.evidence_end.is_empty() {
            println!(
                "   {}",
                style(format!("\"{} ... {}\"", d.evidence_start, d.evidence_end)).dim()
            );
        }
    }

    /// Print one window.
    pub fn window(w: &WindowSummary) {
        let speaker = if w.substantive {
            style(w.speaker.clone()).cyan()
        } else {
            style(w.speaker.clone()).dim()
        };
        println!(
            "  {} #{} [{}..={}] {} {} tokens, chars {}-{}",
            style("*").cyan(),
            w.index,
            w.first_fragment,
            w.anchor_fragment,
            speaker,
            w.tokens,
            w.start_char,
            w.end_char
        );
        println!("     {}", style(content_preview(&w.anchor_text, 100)).dim());
    }

    /// Create a progress bar.
    pub fn progress_bar(len: u64, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(msg.to_string());
        pb
    }
}

/// Truncate content with ellipsis.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let head: String = content.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}
