//! Persistence layer for workflow run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

pub use crate::core::ExecutionStatus;
use crate::core::{JobState, TriggerEvent, Workflow};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary of one workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    /// Workflow name
    pub workflow_name: String,

    /// Kind of event that started the run
    pub event_kind: String,

    /// Final status
    pub status: ExecutionStatus,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run finished (if it did)
    pub completed_at: Option<DateTime<Utc>>,

    pub total_jobs: usize,
    pub succeeded_jobs: usize,
    pub failed_jobs: usize,
    pub skipped_jobs: usize,

    /// First job that failed, in run order
    pub failing_job: Option<String>,

    /// Step that failed that job
    pub failing_step: Option<String>,

    /// Exit code of the failing step, when it exited on its own
    pub exit_code: Option<i32>,
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save (or replace) a run summary
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// Runs of a workflow, newest first
    async fn list_runs(&self, workflow_name: &str) -> Result<Vec<RunSummary>>;

    /// Names of every workflow with recorded runs, sorted
    async fn list_workflows(&self) -> Result<Vec<String>>;

    /// Most recent run of a workflow
    async fn latest_run(&self, workflow_name: &str) -> Result<Option<RunSummary>> {
        Ok(self.list_runs(workflow_name).await?.into_iter().next())
    }

    /// Delete a run
    async fn delete_run(&self, run_id: Uuid) -> Result<()>;
}

/// In-memory persistence (for testing or ephemeral use)
#[derive(Default)]
pub struct InMemoryPersistence {
    runs: RwLock<HashMap<Uuid, RunSummary>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        self.runs.write().await.insert(run.run_id, run.clone());
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        Ok(self.runs.read().await.get(&run_id).cloned())
    }

    async fn list_runs(&self, workflow_name: &str) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let mut result: Vec<RunSummary> = runs
            .values()
            .filter(|r| r.workflow_name == workflow_name)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(result)
    }

    async fn list_workflows(&self) -> Result<Vec<String>> {
        let runs = self.runs.read().await;
        let mut names: Vec<String> = runs.values().map(|r| r.workflow_name.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn delete_run(&self, run_id: Uuid) -> Result<()> {
        self.runs.write().await.remove(&run_id);
        Ok(())
    }
}

/// Default history store: SQLite under the user's data directory
#[cfg(feature = "sqlite")]
pub async fn default_store() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(SqliteRunStore::with_default_path().await?))
}

/// Default history store; without SQLite support history lasts one process
#[cfg(not(feature = "sqlite"))]
pub async fn default_store() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(InMemoryPersistence::new()))
}

/// Create a summary from a finished workflow
pub fn create_summary(workflow: &Workflow, event: &TriggerEvent) -> RunSummary {
    let failing = workflow
        .execution_order()
        .iter()
        .map(|&i| &workflow.jobs[i])
        .find(|job| matches!(job.state, JobState::Failed { .. }));

    let failed_step = failing.and_then(|job| job.failed_step());

    RunSummary {
        run_id: workflow.state.run_id,
        workflow_name: workflow.name.clone(),
        event_kind: event.kind.to_string(),
        status: workflow.state.status,
        started_at: workflow.state.started_at.unwrap_or_else(Utc::now),
        completed_at: workflow.state.completed_at,
        total_jobs: workflow.state.total_jobs,
        succeeded_jobs: workflow.state.succeeded_jobs,
        failed_jobs: workflow.state.failed_jobs,
        skipped_jobs: workflow.state.skipped_jobs,
        failing_job: failing.map(|job| job.id.clone()),
        failing_step: failed_step.as_ref().map(|step| step.name.to_string()),
        exit_code: failed_step.as_ref().and_then(|step| step.exit_code()),
    }
}
