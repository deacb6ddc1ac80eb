//! Scenario-based tests for runline

mod dispatcher;
mod job_needs;
mod lint_pipeline;
mod secrets;
mod triggers;
mod variable_substitution;
