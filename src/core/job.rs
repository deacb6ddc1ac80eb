//! Job domain model

use crate::core::{
    config::{DefaultsConfig, JobConfig},
    state::{JobState, StepFailure, StepOutput, StepState},
    step::Step,
};
use std::collections::BTreeMap;

/// An ordered sequence of steps, reported as a single pass/fail unit
#[derive(Debug, Clone)]
pub struct Job {
    /// Unique job identifier
    pub id: String,

    /// Human-readable job name
    pub name: String,

    /// Execution environment label
    pub runs_on: String,

    /// Jobs that must succeed first
    pub needs: Vec<String>,

    /// Environment shared by every step
    pub env: BTreeMap<String, String>,

    /// Steps, in execution order
    pub steps: Vec<Step>,

    /// Runtime state
    pub state: JobState,
}

/// The step that failed a job, with its diagnostics
#[derive(Debug, Clone)]
pub struct FailedStep<'a> {
    pub index: usize,
    pub name: &'a str,
    pub failure: &'a StepFailure,
    pub output: &'a StepOutput,
}

impl FailedStep<'_> {
    /// Exit code of the failing command, only when it exited on its own
    pub fn exit_code(&self) -> Option<i32> {
        self.failure.exit_code()
    }
}

impl Job {
    /// Create a job from a job config
    pub fn from_config(config: &JobConfig, defaults: &DefaultsConfig) -> Self {
        Job {
            id: config.id.clone(),
            name: config.name.clone().unwrap_or_else(|| config.id.clone()),
            runs_on: config.runs_on.clone(),
            needs: config.needs.clone(),
            env: config.env.clone(),
            steps: config
                .steps
                .iter()
                .map(|s| Step::from_config(s, defaults, config.timeout_secs))
                .collect(),
            state: JobState::Pending,
        }
    }

    /// Get a step by name
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Names of the steps whose command actually ran, in order
    pub fn executed_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.state.was_executed())
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Combined output of every executed step, concatenated in declared order
    pub fn aggregated_output(&self) -> String {
        self.steps
            .iter()
            .filter_map(|s| s.state.output())
            .map(|o| o.combined.as_str())
            .collect()
    }

    /// The step that failed this job, if any
    pub fn failed_step(&self) -> Option<FailedStep<'_>> {
        self.steps.iter().enumerate().find_map(|(index, step)| match &step.state {
            StepState::Failed { failure, output, .. } => Some(FailedStep {
                index,
                name: &step.name,
                failure,
                output,
            }),
            _ => None,
        })
    }

    /// Mark every step that has not started as skipped
    pub fn skip_remaining_steps(&mut self, reason: &str) {
        for step in &mut self.steps {
            if matches!(step.state, StepState::Pending) {
                step.state = StepState::Skipped {
                    reason: reason.to_string(),
                };
            }
        }
    }
}
