use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use marketsnap::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Print the market snapshot as JSON
    Snapshot,
    /// Display the market snapshot as a table
    Report,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => marketsnap::cli::setup::setup(),
        Some(Commands::Snapshot) => {
            marketsnap::run_command(marketsnap::AppCommand::Snapshot, cli.config_path.as_deref())
                .await
        }
        Some(Commands::Report) => {
            marketsnap::run_command(marketsnap::AppCommand::Report, cli.config_path.as_deref())
                .await
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
