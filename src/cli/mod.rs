//! CLI module for ReelCut
//!
//! Stands in for the host application: it imports recordings, runs the
//! media pipeline, drives the editing engine and prints what a step builder
//! would read.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::adapters::ConfigOverrides;
use crate::utils::logging::{LogFormat, LogLevel};

pub mod args;
pub mod commands;

/// ReelCut - non-destructive clip timeline editor
#[derive(Parser)]
#[command(name = "reelcut")]
#[command(about = "ReelCut - Trim, reorder and annotate a recording into clips")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Configuration file (default: the platform config dir)
    #[arg(long, env = "REELCUT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Storage root for drafts and derived media
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Logging level
    #[arg(long, global = true)]
    pub log_level: Option<LogLevel>,

    /// Logging format (pretty, compact, json)
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Command-line values that override file and environment settings
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            store_root: self.store.clone(),
            log_level: self.log_level,
            log_format: self.log_format,
        }
    }
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Create a draft from a recording and derive its scrubbing aids
    Import(args::ImportArgs),
    /// Re-run proxy, sprite and waveform generation for a draft
    Process(args::DraftArgs),
    /// Apply editing operations to a draft
    Edit(args::EditArgs),
    /// Show a draft's timeline
    Show(args::ShowArgs),
    /// Print the step-builder view of a draft as JSON
    Steps(args::DraftArgs),
    /// List stored drafts
    List(args::ListArgs),
    /// Discard a draft
    Delete(args::DraftArgs),
}
