//! Catalog command implementation.

use super::analyze::apply_catalog_arg;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::load_catalog;
use anyhow::Result;

/// Run the catalog command.
pub fn run_catalog(name: Option<&str>, mut settings: Settings) -> Result<()> {
    apply_catalog_arg(&mut settings, name);
    let catalog = load_catalog(&settings)?;

    Output::header(&format!("Fallacy catalog ({})", catalog.len()));
    println!();
    for fallacy in catalog.fallacies() {
        Output::list_item(&format!("{}: {}", fallacy.slug, fallacy.description));
    }

    Ok(())
}
