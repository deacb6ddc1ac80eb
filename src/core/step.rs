//! Step domain model

use crate::core::{
    config::{DefaultsConfig, StepConfig, DEFAULT_SHELL, DEFAULT_TIMEOUT_SECS},
    context::{render_env, render_template, TemplateError},
    state::StepState,
};
use std::collections::{BTreeMap, HashMap};

/// A single step of a job
#[derive(Debug, Clone)]
pub struct Step {
    /// Human-readable step name
    pub name: String,

    /// Command line template
    pub run: String,

    /// Working directory template, relative to the workspace
    pub working_directory: Option<String>,

    /// Environment variable templates
    pub env: BTreeMap<String, String>,

    /// Step env var name -> secret name
    pub secrets: BTreeMap<String, String>,

    /// Standard input template
    pub stdin: Option<String>,

    /// Shell program the command is run through
    pub shell: String,

    /// Wall-clock timeout in seconds
    pub timeout_secs: u64,

    /// Runtime state
    pub state: StepState,
}

/// Step fields after template rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedStep {
    pub run: String,
    pub working_directory: Option<String>,
    pub env: BTreeMap<String, String>,
    pub stdin: Option<String>,
}

impl Step {
    /// Create a step from a step config
    pub fn from_config(
        config: &StepConfig,
        defaults: &DefaultsConfig,
        job_timeout_secs: Option<u64>,
    ) -> Self {
        Step {
            name: config.name.clone(),
            run: config.run.clone(),
            working_directory: config
                .working_directory
                .clone()
                .or_else(|| defaults.working_directory.clone()),
            env: config.env.clone(),
            secrets: config.secrets.clone(),
            stdin: config.stdin.clone(),
            shell: config
                .shell
                .clone()
                .or_else(|| defaults.shell.clone())
                .unwrap_or_else(|| DEFAULT_SHELL.to_string()),
            timeout_secs: config
                .timeout_secs
                .or(job_timeout_secs)
                .or(defaults.timeout_secs)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            state: StepState::Pending,
        }
    }

    /// Render every templated field with the given variables
    pub fn render(&self, variables: &HashMap<String, String>) -> Result<RenderedStep, TemplateError> {
        let env = render_env(&self.env, variables)?;

        Ok(RenderedStep {
            run: render_template(&self.run, variables)?,
            working_directory: self
                .working_directory
                .as_deref()
                .map(|dir| render_template(dir, variables))
                .transpose()?,
            env,
            stdin: self
                .stdin
                .as_deref()
                .map(|input| render_template(input, variables))
                .transpose()?,
        })
    }
}
