//! ReelCut CLI
//!
//! Host application for the timeline editing engine: imports a recording
//! into a draft, derives proxy/sprite/waveform in the background, applies
//! editing operations and prints the step-builder view.
//!
//! # Usage
//!
//! ```bash
//! reelcut import --input case.mp4 --title "Knee arthroscopy"
//! reelcut edit --draft <ID> in=00:12.5 out=00:31 add seek=20 split
//! reelcut steps --draft <ID>
//! ```

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

use reelcut::adapters::TomlConfigAdapter;
use reelcut::app::container::DefaultAppContainer;
use reelcut::cli::{commands, Cli};
use reelcut::utils::logging::init_logging;

/// Main entry point for the ReelCut CLI application
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Configuration precedence: defaults < file < REELCUT_* < flags
    let config = TomlConfigAdapter::new().load(cli.config.as_deref(), &cli.overrides())?;
    init_logging(&config.logging);
    debug!(?config, "Configuration loaded");

    let container = DefaultAppContainer::new(config)?;
    commands::run(&container, cli.command).await?;

    info!("ReelCut completed successfully");
    Ok(())
}
