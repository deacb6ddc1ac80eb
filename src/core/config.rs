//! Workflow configuration from YAML

use crate::core::{
    trigger::{EventFilter, WorkflowTrigger},
    Workflow,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Timeout applied when neither step, job nor defaults set one
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;

/// Shell used when neither step nor defaults set one
pub const DEFAULT_SHELL: &str = "sh";

/// Top-level workflow configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow name
    pub name: String,

    /// Trigger filters; absent means every event starts the workflow
    #[serde(default, rename = "on", skip_serializing_if = "Option::is_none")]
    pub on: Option<TriggerConfig>,

    /// Global variables available to all steps
    #[serde(default)]
    variables: HashMap<String, Value>,

    /// Defaults inherited by every step
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Jobs, in declaration order
    pub jobs: Vec<JobConfig>,
}

/// `on:` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push: Option<EventFilterConfig>,

    #[serde(
        default,
        alias = "pull-request",
        skip_serializing_if = "Option::is_none"
    )]
    pub pull_request: Option<EventFilterConfig>,
}

/// Filters for one event kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilterConfig {
    #[serde(default)]
    pub branches: Vec<String>,

    #[serde(default, alias = "branches-ignore")]
    pub branches_ignore: Vec<String>,

    #[serde(default)]
    pub paths: Vec<String>,

    #[serde(default, alias = "paths-ignore")]
    pub paths_ignore: Vec<String>,
}

/// Workflow-wide step defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub shell: Option<String>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default, alias = "working-directory")]
    pub working_directory: Option<String>,
}

/// Job configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Unique job identifier
    pub id: String,

    /// Human-readable job name (defaults to the id)
    #[serde(default)]
    pub name: Option<String>,

    /// Execution environment label, e.g. `ubuntu-latest`
    #[serde(default = "default_runs_on", alias = "runs-on")]
    pub runs_on: String,

    /// Jobs that must succeed before this one runs
    #[serde(default)]
    pub needs: Vec<String>,

    /// Environment shared by every step of the job
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Timeout for each step of this job (overrides defaults)
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Ordered steps
    pub steps: Vec<StepConfig>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Human-readable step name
    pub name: String,

    /// Command line, run through the step's shell
    pub run: String,

    /// Directory the command runs in, relative to the workspace
    #[serde(default, alias = "working-directory")]
    pub working_directory: Option<String>,

    /// Extra environment variables
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Step env var name -> secret name, acquired for this step only
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,

    /// Text written to the command's standard input
    #[serde(default)]
    pub stdin: Option<String>,

    /// Timeout for this step (overrides job and defaults)
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Shell program (overrides defaults)
    #[serde(default)]
    pub shell: Option<String>,
}

fn default_runs_on() -> String {
    "local".to_string()
}

impl EventFilterConfig {
    fn to_filter(&self) -> EventFilter {
        EventFilter {
            branches: self.branches.clone(),
            branches_ignore: self.branches_ignore.clone(),
            paths: self.paths.clone(),
            paths_ignore: self.paths_ignore.clone(),
        }
    }
}

impl WorkflowConfig {
    /// Load workflow configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse workflow configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: WorkflowConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the workflow configuration
    pub fn validate(&self) -> Result<()> {
        if self.jobs.is_empty() {
            anyhow::bail!("Workflow '{}' declares no jobs", self.name);
        }

        if self.defaults.timeout_secs == Some(0) {
            anyhow::bail!("defaults.timeout_secs must be greater than zero");
        }

        let mut seen_ids = HashSet::new();
        for job in &self.jobs {
            if !seen_ids.insert(&job.id) {
                anyhow::bail!("Duplicate job ID: {}", job.id);
            }
        }

        for job in &self.jobs {
            for dep in &job.needs {
                if !seen_ids.contains(dep) {
                    anyhow::bail!("Job '{}' needs non-existent job '{}'", job.id, dep);
                }
            }

            if job.steps.is_empty() {
                anyhow::bail!("Job '{}' has no steps", job.id);
            }

            if job.timeout_secs == Some(0) {
                anyhow::bail!("Job '{}' timeout_secs must be greater than zero", job.id);
            }

            for (index, step) in job.steps.iter().enumerate() {
                if step.run.trim().is_empty() {
                    anyhow::bail!(
                        "Step {} ('{}') of job '{}' has an empty command",
                        index + 1,
                        step.name,
                        job.id
                    );
                }
                if step.timeout_secs == Some(0) {
                    anyhow::bail!(
                        "Step '{}' of job '{}' timeout_secs must be greater than zero",
                        step.name,
                        job.id
                    );
                }
                for env_name in step.secrets.keys() {
                    if step.env.contains_key(env_name) {
                        anyhow::bail!(
                            "Step '{}' of job '{}' sets '{}' both as plain env and as a secret",
                            step.name,
                            job.id,
                            env_name
                        );
                    }
                }
            }
        }

        for (name, value) in &self.variables {
            if matches!(value, Value::Mapping(_) | Value::Sequence(_) | Value::Tagged(_)) {
                anyhow::bail!("Variable '{}' must be a string, number or boolean", name);
            }
        }

        self.check_cycles()?;

        Ok(())
    }

    /// Check for cycles in the job `needs` graph
    fn check_cycles(&self) -> Result<()> {
        let mut visited = HashSet::new();
        let mut recursion_stack = HashSet::new();

        for job in &self.jobs {
            if !visited.contains(&job.id) {
                self.dfs_check(&job.id, &mut visited, &mut recursion_stack)?;
            }
        }

        Ok(())
    }

    fn dfs_check(
        &self,
        job_id: &str,
        visited: &mut HashSet<String>,
        recursion_stack: &mut HashSet<String>,
    ) -> Result<()> {
        visited.insert(job_id.to_string());
        recursion_stack.insert(job_id.to_string());

        if let Some(job) = self.jobs.iter().find(|j| j.id == job_id) {
            for dep in &job.needs {
                if recursion_stack.contains(dep) {
                    anyhow::bail!("Cycle detected in job needs involving '{}'", dep);
                }
                if !visited.contains(dep) {
                    self.dfs_check(dep, visited, recursion_stack)?;
                }
            }
        }

        recursion_stack.remove(job_id);
        Ok(())
    }

    /// Variables rendered as strings
    pub fn variables_as_string_map(&self) -> HashMap<String, String> {
        self.variables
            .iter()
            .map(|(k, v)| {
                let rendered = match v {
                    Value::String(s) => s.clone(),
                    Value::Bool(b) => b.to_string(),
                    Value::Number(n) => n.to_string(),
                    Value::Null => String::new(),
                    other => serde_yaml::to_string(other).unwrap_or_default().trim().to_string(),
                };
                (k.clone(), rendered)
            })
            .collect()
    }

    /// Number of declared variables
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Total number of steps across all jobs
    pub fn step_count(&self) -> usize {
        self.jobs.iter().map(|j| j.steps.len()).sum()
    }

    /// Build the trigger predicate
    pub fn trigger(&self) -> WorkflowTrigger {
        match &self.on {
            None => WorkflowTrigger::any(),
            Some(on) => WorkflowTrigger {
                any: false,
                push: on.push.as_ref().map(EventFilterConfig::to_filter),
                pull_request: on.pull_request.as_ref().map(EventFilterConfig::to_filter),
            },
        }
    }

    /// Convert config to a Workflow domain model
    pub fn to_workflow(&self) -> Workflow {
        Workflow::from_config(self)
    }
}
