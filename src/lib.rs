//! Fallax - rhetorical fallacy detection for speech transcripts
//!
//! Splits a transcript into fragments, groups consecutive fragments into
//! token-bounded context windows and asks a language model whether the last
//! fragment of each window commits a fallacy from a fixed catalog.
//!
//! # Architecture
//!
//! - `chunking` - Fragment splitting, speaker attribution, token counting, window grouping
//! - `catalog` - The fallacies checked for
//! - `analysis` - The analyzer seam, response parsing, batch orchestration
//! - `sink` - Result persistence (JSON files, SQLite)
//! - `transcript` - Transcript input formats
//! - `orchestrator` - Pipeline coordination
//! - `config` - Configuration management
//!
//! # Example
//!
//! ```rust,no_run
//! use fallax::config::Settings;
//! use fallax::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::from_settings(&settings)?;
//!
//!     let text = std::fs::read_to_string("debate.txt")?;
//!     let report = orchestrator.analyze_text(&text, "analysis-debate").await?;
//!     println!(
//!         "{} detections, saved to {}",
//!         report.outcome.detections.len(),
//!         report.handle
//!     );
//!
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod catalog;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod error;
pub mod openai;
pub mod orchestrator;
pub mod sink;
pub mod transcript;

pub use error::{FallaxError, Result};
