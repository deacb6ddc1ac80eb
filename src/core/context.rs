//! Run context - variables and `{{ name }}` template rendering

use crate::core::trigger::TriggerEvent;
use crate::secrets::Redactor;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

/// Error raised while rendering a template
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder regex is valid")
    })
}

/// Replace every `{{ name }}` in `template` with its value.
///
/// Unknown names are an error rather than being left in place, so a typo
/// never reaches a shell command.
pub fn render_template(
    template: &str,
    variables: &HashMap<String, String>,
) -> Result<String, TemplateError> {
    let regex = placeholder_regex();
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;

    for captures in regex.captures_iter(template) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let value = variables
            .get(name.as_str())
            .ok_or_else(|| TemplateError::UnknownVariable(name.as_str().to_string()))?;
        rendered.push_str(&template[last..whole.start()]);
        rendered.push_str(value);
        last = whole.end();
    }
    rendered.push_str(&template[last..]);

    Ok(rendered)
}

/// Render every value of an environment map
pub fn render_env(
    env: &BTreeMap<String, String>,
    variables: &HashMap<String, String>,
) -> Result<BTreeMap<String, String>, TemplateError> {
    env.iter()
        .map(|(k, v)| render_template(v, variables).map(|value| (k.clone(), value)))
        .collect()
}

/// Execution context for a workflow run
///
/// Holds everything a step needs besides its own definition: variables,
/// the triggering event and workspace root, plus the secret bookkeeping
/// shared by every step of the run.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Workflow variables merged with overrides
    pub variables: HashMap<String, String>,

    /// The event that started this run
    pub event: TriggerEvent,

    /// Directory step working directories are resolved against
    pub workspace: PathBuf,

    /// Runner environment variables holding secrets; removed from every child
    pub secret_sources: Vec<String>,

    /// Secret values seen so far in this run
    pub redactor: Redactor,
}

impl RunContext {
    /// Create a context for `event` rooted at the current directory
    pub fn new(event: TriggerEvent) -> Self {
        Self {
            variables: HashMap::new(),
            event,
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            secret_sources: Vec::new(),
            redactor: Redactor::new(),
        }
    }

    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = workspace.into();
        self
    }

    /// Same settings for another event, with a fresh redactor
    pub fn for_event(&self, event: TriggerEvent) -> Self {
        Self {
            variables: self.variables.clone(),
            event,
            workspace: self.workspace.clone(),
            secret_sources: self.secret_sources.clone(),
            redactor: Redactor::new(),
        }
    }

    /// Add variables; later calls override earlier ones
    pub fn with_variables(mut self, variables: HashMap<String, String>) -> Self {
        self.variables.extend(variables);
        self
    }

    /// Set a variable
    pub fn set_variable(&mut self, key: String, value: String) {
        self.variables.insert(key, value);
    }

    /// Get a variable
    pub fn get_variable(&self, key: &str) -> Option<&String> {
        self.variables.get(key)
    }

    /// Variables available to a step of the given job
    pub fn get_rendering_variables(&self, job_id: &str, runs_on: &str) -> HashMap<String, String> {
        let mut vars = self.variables.clone();

        vars.insert("event.kind".to_string(), self.event.kind.to_string());
        vars.insert(
            "event.branch".to_string(),
            self.event.branch.clone().unwrap_or_default(),
        );
        vars.insert("event.sha".to_string(), self.event.sha.clone().unwrap_or_default());
        vars.insert("job.id".to_string(), job_id.to_string());
        vars.insert("job.runs_on".to_string(), runs_on.to_string());

        vars
    }
}
