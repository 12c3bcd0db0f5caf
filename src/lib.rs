pub mod cli;
pub mod core;
pub mod providers;

use crate::core::config::AppConfig;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Snapshot,
    Report,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("marketsnap starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");
    let config = Arc::new(config);

    let provider = providers::from_config(&config)?;

    match command {
        AppCommand::Snapshot => cli::snapshot::run(provider, config).await,
        AppCommand::Report => cli::report::run(provider, config).await,
    }
}
