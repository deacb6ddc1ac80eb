//! Trigger events and the filter predicate that decides whether a workflow runs

use glob_match::glob_match;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of event that can start a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Push,
    PullRequest,
    /// Explicit request from the command line; bypasses trigger filters
    Manual,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Push => "push",
            EventKind::PullRequest => "pull_request",
            EventKind::Manual => "manual",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(EventKind::Push),
            "pull_request" | "pull-request" => Ok(EventKind::PullRequest),
            "manual" => Ok(EventKind::Manual),
            other => Err(format!(
                "Unknown event kind '{}' (expected push, pull_request or manual)",
                other
            )),
        }
    }
}

/// An incoming event, evaluated against a workflow's trigger
///
/// For pull requests `branch` is the base branch the request targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub kind: EventKind,

    #[serde(default)]
    pub branch: Option<String>,

    /// Paths changed by the event, relative to the repository root
    #[serde(default)]
    pub paths: Vec<String>,

    #[serde(default)]
    pub sha: Option<String>,
}

impl TriggerEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            branch: None,
            paths: Vec::new(),
            sha: None,
        }
    }

    pub fn manual() -> Self {
        Self::new(EventKind::Manual)
    }

    pub fn push(branch: &str) -> Self {
        Self::new(EventKind::Push).with_branch(branch)
    }

    pub fn pull_request(base_branch: &str) -> Self {
        Self::new(EventKind::PullRequest).with_branch(base_branch)
    }

    pub fn with_branch(mut self, branch: &str) -> Self {
        self.branch = Some(branch.to_string());
        self
    }

    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sha(mut self, sha: &str) -> Self {
        self.sha = Some(sha.to_string());
        self
    }
}

/// Filters attached to one event kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub branches: Vec<String>,
    pub branches_ignore: Vec<String>,
    pub paths: Vec<String>,
    pub paths_ignore: Vec<String>,
}

impl EventFilter {
    /// Check the event's branch and paths against this filter
    pub fn matches(&self, event: &TriggerEvent) -> bool {
        self.branch_allowed(event.branch.as_deref()) && self.paths_allowed(&event.paths)
    }

    fn branch_allowed(&self, branch: Option<&str>) -> bool {
        if self.branches.is_empty() && self.branches_ignore.is_empty() {
            return true;
        }
        let Some(branch) = branch else {
            return false;
        };
        if !self.branches.is_empty() && !self.branches.iter().any(|p| glob_match(p, branch)) {
            return false;
        }
        !self.branches_ignore.iter().any(|p| glob_match(p, branch))
    }

    /// At least one changed path must pass both `paths` and `paths_ignore`
    fn paths_allowed(&self, paths: &[String]) -> bool {
        if self.paths.is_empty() && self.paths_ignore.is_empty() {
            return true;
        }
        paths.iter().any(|path| {
            let included = self.paths.is_empty() || self.paths.iter().any(|p| path_matches(p, path));
            included && !self.paths_ignore.iter().any(|p| path_matches(p, path))
        })
    }
}

/// Match a path glob the way CI path filters do.
///
/// A leading `**` with no following slash (`**.py`) matches the suffix at any
/// depth, including the repository root.
pub fn path_matches(pattern: &str, path: &str) -> bool {
    let path = path.trim_start_matches("./");
    if glob_match(pattern, path) {
        return true;
    }
    match pattern.strip_prefix("**") {
        Some(rest) if !rest.is_empty() && !rest.starts_with('/') => {
            glob_match(&format!("**/*{}", rest), path) || glob_match(&format!("*{}", rest), path)
        }
        _ => false,
    }
}

/// The trigger section of a workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowTrigger {
    /// Accept every event (no `on` section was declared)
    pub any: bool,
    pub push: Option<EventFilter>,
    pub pull_request: Option<EventFilter>,
}

impl WorkflowTrigger {
    /// Trigger that accepts every event
    pub fn any() -> Self {
        Self {
            any: true,
            push: None,
            pull_request: None,
        }
    }

    /// Decide whether `event` starts this workflow
    pub fn matches(&self, event: &TriggerEvent) -> bool {
        if self.any {
            return true;
        }
        match event.kind {
            EventKind::Manual => true,
            EventKind::Push => self.push.as_ref().is_some_and(|f| f.matches(event)),
            EventKind::PullRequest => self.pull_request.as_ref().is_some_and(|f| f.matches(event)),
        }
    }

    /// Event kinds this trigger listens to
    pub fn event_kinds(&self) -> Vec<EventKind> {
        if self.any {
            return vec![EventKind::Push, EventKind::PullRequest];
        }
        let mut kinds = Vec::new();
        if self.push.is_some() {
            kinds.push(EventKind::Push);
        }
        if self.pull_request.is_some() {
            kinds.push(EventKind::PullRequest);
        }
        kinds
    }
}

impl Default for WorkflowTrigger {
    fn default() -> Self {
        Self::any()
    }
}
