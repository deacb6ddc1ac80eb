//! Workflow execution engine

pub mod dispatcher;
pub mod engine;
pub mod executor;

pub use dispatcher::{ConcurrencyPolicy, Dispatcher, RunHandle, RunReport};
pub use engine::{EventHandler, ExecutionEngine, ExecutionEvent};
pub use executor::{ExecutionResult, StepExecutor};
