//! Command-line interface for bikewatch.
//!
//! This module provides the CLI structure for the `bikewatch` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AlertCommand, AlertStatusArg, BikeCommand, ConfigCommand, DisplayCommand, OutputFormat,
    OverrideArg, RecoverArgs, RegisterBikeArgs, ReportArgs, StatusCommand, StolenCommand,
    TsvScopeArg,
};

/// bikewatch - Stolen bike registry and recovery tracking
///
/// Registers bikes, tracks theft reports, records recoveries, and curates
/// which recoveries are shown publicly.
#[derive(Debug, Parser)]
#[command(name = "bikewatch")]
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
    /// Register bikes and manage their photos
    #[command(subcommand)]
    Bike(BikeCommand),

    /// Report thefts and record recoveries
    #[command(subcommand)]
    Stolen(StolenCommand),

    /// Manage promoted theft alerts
    #[command(subcommand)]
    Alert(AlertCommand),

    /// Publish recovery stories
    #[command(subcommand)]
    Display(DisplayCommand),

    /// Show database status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
