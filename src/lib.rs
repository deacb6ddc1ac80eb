//! runline - runs build/release workflows: ordered shell steps, fail-fast

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod process;
pub mod secrets;

// Re-export commonly used types
pub use crate::core::{
    config::WorkflowConfig, EventKind, ExecutionStatus, Job, JobState, RunContext, Step,
    StepFailure, StepState, TriggerEvent, Workflow, WorkflowTrigger,
};
pub use execution::{ConcurrencyPolicy, Dispatcher, ExecutionEngine, ExecutionEvent};
pub use process::{CancelSignal, CommandRunner, OutputCallback, RunnerConfig, ShellRunner};
pub use secrets::{EnvSecretProvider, Redactor, SecretProvider, StaticSecretProvider};
