//! Command output and process error types

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Error types for running a command
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while running command: {0}")]
    Io(#[from] std::io::Error),
}

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// How the command came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited on its own; signal deaths map to 128 + signal number
    Exited(i32),
    /// Killed after exceeding its timeout
    TimedOut,
    /// Killed because the run was cancelled
    Cancelled,
}

/// Everything captured from one command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub termination: Termination,

    /// Raw exit status, also for killed commands when one was observed
    pub exit_code: Option<i32>,

    pub stdout: String,
    pub stderr: String,

    /// Both streams in arrival order
    pub combined: String,

    pub duration: Duration,
}

impl CommandOutput {
    /// Output of a command that exited with `code` and printed `stdout`
    pub fn exited(code: i32, stdout: impl Into<String>) -> Self {
        let stdout = stdout.into();
        Self {
            termination: Termination::Exited(code),
            exit_code: Some(code),
            combined: stdout.clone(),
            stdout,
            stderr: String::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn success(&self) -> bool {
        self.termination == Termination::Exited(0)
    }

    /// Append a line to its stream and to the combined transcript
    pub fn push_line(&mut self, stream: OutputStream, line: &str) {
        match stream {
            OutputStream::Stdout => self.stdout.push_str(line),
            OutputStream::Stderr => self.stderr.push_str(line),
        }
        self.combined.push_str(line);
    }
}
