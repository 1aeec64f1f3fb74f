pub mod cli;
pub mod core;
pub mod providers;

// Re-export for the binary and integration tests
pub use crate::core::config;

use crate::cli::summary::OutputFormat;
use anyhow::Result;
use tracing::{debug, info};

pub enum AppCommand {
    Summary { format: OutputFormat },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fxfolio starting...");

    let config = match config_path {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Summary { format } => cli::summary::run(&config, format).await,
    }
}
