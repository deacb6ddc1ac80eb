//! CLI command definitions

use crate::core::{EventKind, TriggerEvent};
use crate::execution::ConcurrencyPolicy;
use clap::Args;
use std::path::PathBuf;

/// Describes the event a command acts on
#[derive(Debug, Args, Clone)]
pub struct EventArgs {
    /// Event kind: push, pull_request or manual
    #[arg(long, default_value = "manual")]
    pub event: EventKind,

    /// Branch pushed to, or the base branch of a pull request
    #[arg(long)]
    pub branch: Option<String>,

    /// Changed path (repeatable)
    #[arg(long = "path")]
    pub paths: Vec<String>,

    /// Commit SHA
    #[arg(long)]
    pub sha: Option<String>,
}

impl EventArgs {
    pub fn to_event(&self) -> TriggerEvent {
        let mut event = TriggerEvent::new(self.event).with_paths(self.paths.iter().cloned());
        if let Some(branch) = &self.branch {
            event = event.with_branch(branch);
        }
        if let Some(sha) = &self.sha {
            event = event.with_sha(sha);
        }
        event
    }
}

/// Run a workflow
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Variable overrides (key=value)
    #[arg(long = "var", value_parser = parse_key_value)]
    pub variables: Vec<(String, String)>,

    #[command(flatten)]
    pub event: EventArgs,

    /// Directory step working directories are relative to (default: current directory)
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Read secrets from environment variables named <PREFIX><SECRET>
    #[arg(long, default_value = "")]
    pub secret_prefix: String,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,
}

/// Validate a workflow configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Check whether an event would trigger a workflow
#[derive(Debug, Args, Clone)]
pub struct CheckTriggerCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    #[command(flatten)]
    pub event: EventArgs,
}

/// Read events as JSON lines from stdin and run the workflow for each match
#[derive(Debug, Args, Clone)]
pub struct ListenCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// What to do with runs still active when a new event matches:
    /// queue, cancel-superseded or concurrent
    #[arg(long, default_value = "queue")]
    pub policy: ConcurrencyPolicy,

    /// Variable overrides (key=value)
    #[arg(long = "var", value_parser = parse_key_value)]
    pub variables: Vec<(String, String)>,

    /// Directory step working directories are relative to (default: current directory)
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Read secrets from environment variables named <PREFIX><SECRET>
    #[arg(long, default_value = "")]
    pub secret_prefix: String,

    /// Don't save runs to history
    #[arg(long)]
    pub no_history: bool,
}

/// List workflows with recorded runs
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Show run counts
    #[arg(long)]
    pub with_counts: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Workflow name to filter by
    #[arg(short, long)]
    pub workflow: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show full details
    #[arg(long)]
    pub verbose: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a single run
    #[arg(long)]
    pub run_id: Option<String>,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
