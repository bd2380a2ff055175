//! CLI module for Fallax.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use crate::config::{SinkKind, SpeakerMode, SplitMode};
use clap::{Args, Parser, Subcommand};

/// Fallax - rhetorical fallacy detection for speech transcripts
///
/// Splits a transcript into fragments, groups them into context windows
/// and asks a language model to judge the last fragment of each window.
#[derive(Parser, Debug)]
#[command(name = "fallax")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by commands that split a transcript.
#[derive(Args, Debug, Clone, Default)]
pub struct ChunkingArgs {
    /// How to cut fragments (paragraph, sentence)
    #[arg(long)]
    pub split: Option<SplitMode>,

    /// How to attribute speakers (fixed, label)
    #[arg(long)]
    pub speakers: Option<SpeakerMode>,

    /// Token budget per window
    #[arg(long)]
    pub max_tokens: Option<usize>,

    /// Maximum fragments per window
    #[arg(long)]
    pub max_fragments: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Transcript file (.txt, or .json with timed segments); '-' reads stdin
    pub input: String,

    /// Prefix for the results file (default: analysis-<file stem>)
    #[arg(short, long)]
    pub prefix: Option<String>,

    /// Maximum windows to analyze (0 = no limit)
    #[arg(long, env = "FALLAX_MAX_WINDOWS")]
    pub max_windows: Option<usize>,

    /// Pause between model calls in milliseconds
    #[arg(long, env = "FALLAX_PAUSE_MS")]
    pub pause_ms: Option<u64>,

    /// Chat model to use
    #[arg(short, long, env = "FALLAX_MODEL")]
    pub model: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint
    #[arg(long, env = "FALLAX_API_BASE")]
    pub api_base: Option<String>,

    /// Catalog preset (short, extended) or path to a catalog TOML file
    #[arg(long)]
    pub catalog: Option<String>,

    /// Where to write results (json, sqlite)
    #[arg(long)]
    pub sink: Option<SinkKind>,

    /// Print the run report as JSON. Detection offsets index the report's
    /// `document` field, the normalized text (timestamps stripped in sentence mode)
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub chunking: ChunkingArgs,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a transcript for rhetorical fallacies
    Analyze(AnalyzeArgs),

    /// Show how a transcript is split into windows, without calling the model
    Windows {
        /// Transcript file; '-' reads stdin
        input: String,

        /// Print windows as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        chunking: ChunkingArgs,
    },

    /// List the fallacies of a catalog
    Catalog {
        /// Catalog preset (short, extended) or path to a catalog TOML file
        name: Option<String>,
    },

    /// Print the detections of a previous run
    Report {
        /// Results JSON file, or a handle like sqlite:<db>#<run id>
        handle: String,

        /// Print raw records as JSON
        #[arg(long)]
        json: bool,
    },

    /// List runs stored in the SQLite sink
    Runs,

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_analyze() {
        let cli = Cli::try_parse_from([
            "fallax",
            "analyze",
            "debate.txt",
            "--max-windows",
            "0",
            "--split",
            "paragraph",
            "--speakers",
            "label",
            "--sink",
            "sqlite",
        ])
        .unwrap();

        let Commands::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.input, "debate.txt");
        assert_eq!(args.max_windows, Some(0));
        assert_eq!(args.chunking.split, Some(SplitMode::Paragraph));
        assert_eq!(args.chunking.speakers, Some(SpeakerMode::Label));
        assert_eq!(args.sink, Some(SinkKind::Sqlite));
    }

    #[test]
    fn test_parse_rejects_unknown_split() {
        assert!(Cli::try_parse_from(["fallax", "windows", "a.txt", "--split", "words"]).is_err());
    }
}
