//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::catalog::RecordingLevel;

/// Record command arguments.
#[derive(Debug, Args)]
pub struct RecordCommand {
    /// Length of the simulated flight in seconds
    #[arg(short, long, default_value = "300")]
    pub duration: f32,

    /// Host ticks per second
    #[arg(long, default_value = "20")]
    pub tick_rate: u32,

    /// Simulated seconds per real second
    #[arg(long, default_value = "1")]
    pub speed: f32,

    /// Let the auto policy start and stop sessions
    #[arg(short, long)]
    pub auto: bool,

    /// Recording level (overrides configuration)
    #[arg(short, long, value_enum)]
    pub level: Option<LevelArg>,

    /// Capture interval in seconds (overrides configuration)
    #[arg(short, long)]
    pub interval: Option<f32>,

    /// Directory for trace files (overrides configuration)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Departure airport code
    #[arg(long, default_value = "KSEA")]
    pub from: String,

    /// Arrival airport code
    #[arg(long, default_value = "KPDX")]
    pub to: String,
}

/// Inspect command arguments.
#[derive(Debug, Args)]
pub struct InspectCommand {
    /// Trace file to decode
    pub file: PathBuf,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,

    /// List the embedded channel schema
    #[arg(long)]
    pub channels: bool,
}

/// Channels command arguments.
#[derive(Debug, Args)]
pub struct ChannelsCommand {
    /// Recording level to list (defaults to the configured level)
    #[arg(short, long, value_enum)]
    pub level: Option<LevelArg>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Recording level argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LevelArg {
    /// Position, attitude and speeds
    Simple,
    /// Adds controls, engines and ground contact
    Normal,
    /// Everything
    Detailed,
}

impl From<LevelArg> for RecordingLevel {
    fn from(arg: LevelArg) -> Self {
        match arg {
            LevelArg::Simple => Self::Simple,
            LevelArg::Normal => Self::Normal,
            LevelArg::Detailed => Self::Detailed,
        }
    }
}
