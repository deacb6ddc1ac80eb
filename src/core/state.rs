//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Overall workflow execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Workflow has not started
    Pending,
    /// Workflow is currently running
    Running,
    /// Every job succeeded
    Completed,
    /// At least one job failed or was skipped
    Failed,
    /// The run was cancelled before it could finish
    Cancelled,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "Pending",
            ExecutionStatus::Running => "Running",
            ExecutionStatus::Completed => "Completed",
            ExecutionStatus::Failed => "Failed",
            ExecutionStatus::Cancelled => "Cancelled",
        }
    }

    /// Process exit code for this status
    pub fn exit_code(&self) -> i32 {
        match self {
            ExecutionStatus::Completed => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(ExecutionStatus::Pending),
            "Running" => Ok(ExecutionStatus::Running),
            "Completed" => Ok(ExecutionStatus::Completed),
            "Failed" => Ok(ExecutionStatus::Failed),
            "Cancelled" => Ok(ExecutionStatus::Cancelled),
            other => Err(format!("Unknown execution status: {}", other)),
        }
    }
}

/// Captured output of one step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutput {
    pub stdout: String,
    pub stderr: String,
    /// stdout and stderr interleaved in arrival order
    pub combined: String,
    /// None when the command never produced an exit status
    pub exit_code: Option<i32>,
}

/// Why a step failed.
///
/// Every variant fails the job the same way; the distinction only feeds
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum StepFailure {
    #[error("exited with code {code}")]
    ExitCode { code: i32 },

    #[error("timed out after {secs} seconds")]
    Timeout { secs: u64 },

    #[error("cancelled")]
    Cancelled,

    #[error("failed to start: {message}")]
    Spawn { message: String },

    #[error("template error: {message}")]
    Template { message: String },

    #[error("secret unavailable: {message}")]
    Secret { message: String },
}

impl StepFailure {
    /// Exit code reported for this failure, if the command produced one
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            StepFailure::ExitCode { code } => Some(*code),
            _ => None,
        }
    }
}

/// State of a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StepState {
    /// Step has not run yet
    Pending,
    /// Step's command is running
    Running {
        started_at: DateTime<Utc>,
    },
    /// Command exited 0
    Succeeded {
        output: StepOutput,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    },
    /// Command exited non-zero, timed out, was cancelled or never started
    Failed {
        failure: StepFailure,
        output: StepOutput,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    },
    /// Step was never started (earlier failure, cancellation, skipped job)
    Skipped {
        reason: String,
    },
}

impl StepState {
    /// Check if step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepState::Succeeded { .. } | StepState::Failed { .. } | StepState::Skipped { .. }
        )
    }

    /// Whether the step's command was actually started
    pub fn was_executed(&self) -> bool {
        matches!(self, StepState::Succeeded { .. } | StepState::Failed { .. })
    }

    /// Captured output, for steps that ran
    pub fn output(&self) -> Option<&StepOutput> {
        match self {
            StepState::Succeeded { output, .. } | StepState::Failed { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// State of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Running {
        started_at: DateTime<Utc>,
    },
    Succeeded {
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    },
    Failed {
        /// Zero-based index of the failing step
        step_index: usize,
        step_name: String,
        failure: StepFailure,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    },
    /// Job never ran because a job it needs did not succeed, or the run was cancelled
    Skipped {
        reason: String,
    },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded { .. } | JobState::Failed { .. } | JobState::Skipped { .. }
        )
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, JobState::Succeeded { .. })
    }
}

/// Overall workflow state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Unique run ID
    pub run_id: Uuid,

    /// Current execution status
    pub status: ExecutionStatus,

    /// When execution started
    pub started_at: Option<DateTime<Utc>>,

    /// When execution completed/failed
    pub completed_at: Option<DateTime<Utc>>,

    /// Total number of jobs
    pub total_jobs: usize,

    /// Number of succeeded jobs
    pub succeeded_jobs: usize,

    /// Number of failed jobs
    pub failed_jobs: usize,

    /// Number of skipped jobs
    pub skipped_jobs: usize,
}

impl WorkflowState {
    /// Create a new workflow state
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: ExecutionStatus::Pending,
            started_at: None,
            completed_at: None,
            total_jobs: 0,
            succeeded_jobs: 0,
            failed_jobs: 0,
            skipped_jobs: 0,
        }
    }

    /// Mark workflow as started
    pub fn start(&mut self, total_jobs: usize) {
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
        self.total_jobs = total_jobs;
    }

    /// Mark workflow as finished with the given terminal status
    pub fn finish(&mut self, status: ExecutionStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    /// Update job counts from the current job states
    pub fn update_counts<'a>(&mut self, jobs: impl Iterator<Item = &'a JobState>) {
        let (mut succeeded, mut failed, mut skipped) = (0, 0, 0);
        for state in jobs {
            match state {
                JobState::Succeeded { .. } => succeeded += 1,
                JobState::Failed { .. } => failed += 1,
                JobState::Skipped { .. } => skipped += 1,
                _ => {}
            }
        }
        self.succeeded_jobs = succeeded;
        self.failed_jobs = failed;
        self.skipped_jobs = skipped;
    }

    /// Calculate progress (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_jobs == 0 {
            return 0.0;
        }
        (self.succeeded_jobs + self.failed_jobs + self.skipped_jobs) as f64 / self.total_jobs as f64
    }
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new()
    }
}
