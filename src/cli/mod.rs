//! Command-line interface

pub mod commands;
pub mod output;
pub mod terminal_output;

use clap::{Parser, Subcommand};
use commands::{
    CheckTriggerCommand, HistoryCommand, ListCommand, ListenCommand, RunCommand, ValidateCommand,
};
use std::ffi::OsString;

/// Runs build and release workflows: shell steps, fail-fast
#[derive(Debug, Parser, Clone)]
#[command(name = "runline")]
#[command(version)]
#[command(about = "Runs YAML-defined build/release workflows, stopping each job at its first failing step", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print step output live
    #[arg(short, long, global = true)]
    pub stream: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a workflow once for an event
    Run(RunCommand),

    /// Validate a workflow configuration
    Validate(ValidateCommand),

    /// Check whether an event matches a workflow's trigger (exit 0 = match)
    CheckTrigger(CheckTriggerCommand),

    /// Run a workflow for every matching event read from stdin
    Listen(ListenCommand),

    /// List workflows with recorded runs
    List(ListCommand),

    /// Show run history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
