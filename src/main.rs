//! Fallax CLI entry point.

use anyhow::Result;
use clap::Parser;
use fallax::cli::{commands, Cli, Commands};
use fallax::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Initialize logging; -v flags win over the configured level
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("fallax={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    std::fs::create_dir_all(settings.data_dir())?;

    match &cli.command {
        Commands::Analyze(args) => {
            commands::run_analyze(args, settings).await?;
        }

        Commands::Windows { input, json, chunking } => {
            commands::run_windows(input, *json, chunking, settings)?;
        }

        Commands::Catalog { name } => {
            commands::run_catalog(name.as_deref(), settings)?;
        }

        Commands::Report { handle, json } => {
            commands::run_report(handle, *json)?;
        }

        Commands::Runs => {
            commands::run_runs(&settings)?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, *port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings)?;
        }
    }

    Ok(())
}
