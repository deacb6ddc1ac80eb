//! Workflow domain model

use crate::core::{
    config::WorkflowConfig,
    job::Job,
    state::{ExecutionStatus, JobState, WorkflowState},
    trigger::WorkflowTrigger,
};
use std::collections::{HashMap, HashSet};

/// A loaded workflow: trigger, variables and jobs
#[derive(Debug, Clone)]
pub struct Workflow {
    /// Workflow name
    pub name: String,

    /// Trigger predicate
    pub trigger: WorkflowTrigger,

    /// Global variables available to all steps
    pub variables: HashMap<String, String>,

    /// Jobs in declaration order
    pub jobs: Vec<Job>,

    /// Execution state
    pub state: WorkflowState,

    /// Job indices in run order (topological over `needs`)
    execution_order: Vec<usize>,
}

impl Workflow {
    /// Create a workflow from configuration
    pub fn from_config(config: &WorkflowConfig) -> Self {
        let jobs: Vec<Job> = config
            .jobs
            .iter()
            .map(|job_config| Job::from_config(job_config, &config.defaults))
            .collect();

        let execution_order = Self::topological_sort(&jobs);

        Workflow {
            name: config.name.clone(),
            trigger: config.trigger(),
            variables: config.variables_as_string_map(),
            jobs,
            state: WorkflowState::new(),
            execution_order,
        }
    }

    /// Get a job by ID
    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// Get a mutable job by ID
    pub fn job_mut(&mut self, id: &str) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id == id)
    }

    /// Job indices in the order they run
    pub fn execution_order(&self) -> &[usize] {
        &self.execution_order
    }

    /// Job ids in the order they run
    pub fn execution_order_ids(&self) -> Vec<&str> {
        self.execution_order
            .iter()
            .map(|&i| self.jobs[i].id.as_str())
            .collect()
    }

    /// Every job reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.jobs.iter().all(|j| j.state.is_terminal())
    }

    /// First need of `job` that did not succeed
    pub fn unmet_need<'a>(&self, job: &'a Job) -> Option<&'a str> {
        job.needs
            .iter()
            .find(|need| !self.job(need).is_some_and(|j| j.state.is_succeeded()))
            .map(String::as_str)
    }

    /// Secret names requested anywhere in the workflow
    pub fn secret_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .jobs
            .iter()
            .flat_map(|j| j.steps.iter())
            .flat_map(|s| s.secrets.values().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Status the run ends with once every job is terminal
    pub fn final_status(&self, cancelled: bool) -> ExecutionStatus {
        if self.jobs.iter().all(|j| j.state.is_succeeded()) {
            ExecutionStatus::Completed
        } else if cancelled {
            ExecutionStatus::Cancelled
        } else {
            ExecutionStatus::Failed
        }
    }

    /// Process exit code: 0 on success, else the first failing step's own exit
    /// code in run order, else 1
    pub fn exit_code(&self) -> i32 {
        let status = self.final_status(false);
        if status == ExecutionStatus::Completed {
            return 0;
        }
        self.execution_order
            .iter()
            .find_map(|&i| self.jobs[i].failed_step())
            .and_then(|step| step.exit_code())
            .filter(|code| (1..=255).contains(code))
            .unwrap_or_else(|| status.exit_code())
    }

    /// Refresh job counters in the workflow state
    pub fn update_state_counts(&mut self) {
        let states: Vec<&JobState> = self.jobs.iter().map(|j| &j.state).collect();
        self.state.update_counts(states.into_iter());
    }

    /// Topological sort of jobs over `needs`, keeping declaration order for ties
    fn topological_sort(jobs: &[Job]) -> Vec<usize> {
        let index: HashMap<&str, usize> = jobs
            .iter()
            .enumerate()
            .map(|(i, j)| (j.id.as_str(), i))
            .collect();

        let mut result = Vec::new();
        let mut visited = HashSet::new();

        for i in 0..jobs.len() {
            Self::visit(i, jobs, &index, &mut visited, &mut result);
        }

        result
    }

    fn visit(
        job_index: usize,
        jobs: &[Job],
        index: &HashMap<&str, usize>,
        visited: &mut HashSet<usize>,
        result: &mut Vec<usize>,
    ) {
        if !visited.insert(job_index) {
            return;
        }

        for need in &jobs[job_index].needs {
            if let Some(&dep) = index.get(need.as_str()) {
                Self::visit(dep, jobs, index, visited, result);
            }
        }

        result.push(job_index);
    }
}
