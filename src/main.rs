//! Demix CLI - on-device stem separation
//!
//! Command-line interface for the demix separation pipeline.

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use demix::cli::{commands, CacheAction, Cli, Commands};
use demix::config::DemixConfig;
use demix::control::JobOutcome;
use demix::DemixError;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Demix stem separator");

    let config = DemixConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    let Some(cmd) = cli.command else {
        println!("Demix v{}", env!("CARGO_PKG_VERSION"));
        println!("Use --help for available commands");
        return Ok(());
    };

    let result = handle_command(cmd, &config);
    if let Err(err) = &result {
        print_hints(err);
    }
    result
}

fn print_hints(err: &anyhow::Error) {
    let Some(demix_err) = err.chain().find_map(|cause| cause.downcast_ref::<DemixError>()) else {
        return;
    };
    for hint in demix_err.recovery_suggestions() {
        eprintln!("  hint: {}", hint);
    }
}

fn handle_command(cmd: Commands, config: &DemixConfig) -> anyhow::Result<()> {
    match cmd {
        Commands::Separate { input, output } => {
            let outcome = commands::separate(config, &input, &output)
                .with_context(|| format!("separating {}", input.display()))?;
            if let JobOutcome::Failed { message } = outcome {
                bail!(message);
            }
            Ok(())
        }
        Commands::FetchModel => Ok(commands::fetch_model(config)?),
        Commands::Cache { action } => {
            match action {
                CacheAction::Status => commands::cache_status(config)?,
                CacheAction::Verify => commands::cache_verify(config)?,
                CacheAction::Clear => commands::cache_clear(config)?,
            }
            Ok(())
        }
    }
}
