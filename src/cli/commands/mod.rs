//! CLI command implementations.

mod analyze;
mod catalog;
mod config;
mod report;
mod serve;
mod windows;

pub use analyze::run_analyze;
pub use catalog::run_catalog;
pub use config::run_config;
pub use report::{run_report, run_runs};
pub use serve::run_serve;
pub use windows::run_windows;
