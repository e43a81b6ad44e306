//! Command-line interface for xblackbox.
//!
//! This module provides the CLI structure and command handlers for the
//! `xbbrec` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ChannelsCommand, ConfigCommand, InspectCommand, LevelArg, RecordCommand};

use crate::logging::Verbosity;

/// xbbrec - Flight data recorder
///
/// Samples simulator telemetry into compact, self-describing binary traces
/// and decodes them again.
#[derive(Debug, Parser)]
#[command(name = "xbbrec")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record a synthetic flight
    Record(RecordCommand),

    /// Decode and summarize a trace file
    Inspect(InspectCommand),

    /// List the channels recorded at a level
    Channels(ChannelsCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}
