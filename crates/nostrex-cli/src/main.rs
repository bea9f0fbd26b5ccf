//! nostrex CLI entry point

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

use nostrex_cli::{app::NostrexApp, cli::Cli, commands::CommandDispatcher, config::AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let mut config = load_configuration(&cli)?;
    if let Some(data_dir) = &cli.data_dir {
        config.storage.data_dir = Some(data_dir.into());
    }

    let app = NostrexApp::new(config).context("failed to open nostrex data directory")?;

    let mut stdout = std::io::stdout();
    CommandDispatcher::execute(cli.command, &app, &mut stdout).await?;

    debug!("nostrex exited successfully");
    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from the given file or the standard layers
fn load_configuration(cli: &Cli) -> anyhow::Result<AppConfig> {
    let config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            AppConfig::load_from_file(path)?
        }
        None => AppConfig::load()?,
    };
    Ok(config)
}
