//! CLI Module
//!
//! Command-line interface for the demix stem separator.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Demix - on-device music source separation
#[derive(Parser, Debug)]
#[command(name = "demix-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Split an audio file into stems
    #[command(name = "separate")]
    Separate {
        /// Input WAV file
        input: PathBuf,

        /// Directory the stems are written to
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Download the model into the cache without separating anything
    #[command(name = "fetch-model")]
    FetchModel,

    /// Inspect or reset the model cache
    #[command(name = "cache")]
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// Show the cached entry and disk usage
    Status,
    /// Re-hash the cached model against its manifest checksum
    Verify,
    /// Delete the cached model
    Clear,
}
