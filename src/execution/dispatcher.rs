//! Dispatcher - starts runs for incoming events under a concurrency policy

use crate::{
    core::{ExecutionStatus, RunContext, TriggerEvent, Workflow, WorkflowState},
    execution::ExecutionEngine,
    process::{CancelSignal, CommandRunner},
};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

/// What happens when an event arrives while earlier runs are still active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcurrencyPolicy {
    /// One run at a time, in arrival order
    #[default]
    Queue,
    /// Cancel every queued or running run, then queue the new one
    CancelSuperseded,
    /// Start every run immediately
    Concurrent,
}

impl ConcurrencyPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConcurrencyPolicy::Queue => "queue",
            ConcurrencyPolicy::CancelSuperseded => "cancel-superseded",
            ConcurrencyPolicy::Concurrent => "concurrent",
        }
    }
}

impl fmt::Display for ConcurrencyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConcurrencyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queue" => Ok(ConcurrencyPolicy::Queue),
            "cancel-superseded" | "cancel_superseded" => Ok(ConcurrencyPolicy::CancelSuperseded),
            "concurrent" => Ok(ConcurrencyPolicy::Concurrent),
            other => Err(format!(
                "Unknown policy '{}' (expected queue, cancel-superseded or concurrent)",
                other
            )),
        }
    }
}

/// Outcome of one dispatched run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub event: TriggerEvent,
    pub status: ExecutionStatus,
    /// The workflow with its final job and step states
    pub workflow: Workflow,
}

/// Handle to a dispatched run
#[derive(Debug)]
pub struct RunHandle {
    pub run_id: Uuid,
    cancel: CancelSignal,
    report: oneshot::Receiver<RunReport>,
}

impl RunHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to finish; `None` if it was dropped unfinished
    pub async fn wait(self) -> Option<RunReport> {
        self.report.await.ok()
    }
}

type Outstanding = Arc<Mutex<Vec<(Uuid, CancelSignal)>>>;

struct PendingRun {
    workflow: Workflow,
    ctx: RunContext,
    cancel: CancelSignal,
    reply: oneshot::Sender<RunReport>,
}

impl PendingRun {
    async fn execute<R: CommandRunner + 'static>(
        mut self,
        engine: &ExecutionEngine<R>,
        outstanding: &Outstanding,
    ) {
        let run_id = self.workflow.state.run_id;
        let status = engine
            .execute(&mut self.workflow, &self.ctx, &self.cancel)
            .await;

        outstanding.lock().await.retain(|(id, _)| *id != run_id);

        let report = RunReport {
            run_id,
            event: self.ctx.event,
            status,
            workflow: self.workflow,
        };
        if self.reply.send(report).is_err() {
            debug!("Nobody waiting for run {}", run_id);
        }
    }
}

/// Starts runs of one workflow for incoming events
pub struct Dispatcher<R> {
    workflow: Workflow,
    base_context: RunContext,
    engine: Arc<ExecutionEngine<R>>,
    policy: ConcurrencyPolicy,
    queue: mpsc::UnboundedSender<PendingRun>,
    outstanding: Outstanding,
}

impl<R: CommandRunner + 'static> Dispatcher<R> {
    /// Create a dispatcher; must be called within a tokio runtime
    pub fn new(
        workflow: Workflow,
        base_context: RunContext,
        engine: Arc<ExecutionEngine<R>>,
        policy: ConcurrencyPolicy,
    ) -> Self {
        let outstanding: Outstanding = Arc::new(Mutex::new(Vec::new()));
        let (queue, mut rx) = mpsc::unbounded_channel::<PendingRun>();

        let worker_engine = engine.clone();
        let worker_outstanding = outstanding.clone();
        tokio::spawn(async move {
            while let Some(run) = rx.recv().await {
                run.execute(&worker_engine, &worker_outstanding).await;
            }
        });

        Self {
            workflow,
            base_context,
            engine,
            policy,
            queue,
            outstanding,
        }
    }

    pub fn policy(&self) -> ConcurrencyPolicy {
        self.policy
    }

    /// Start a run for `event`, or return `None` if the trigger does not match
    pub async fn dispatch(&self, event: TriggerEvent) -> Option<RunHandle> {
        if !self.workflow.trigger.matches(&event) {
            info!(
                "Event {} on {} does not match workflow {}, skipping",
                event.kind,
                event.branch.as_deref().unwrap_or("-"),
                self.workflow.name
            );
            return None;
        }

        let mut workflow = self.workflow.clone();
        workflow.state = WorkflowState::new();
        let run_id = workflow.state.run_id;
        let cancel = CancelSignal::new();

        {
            let mut outstanding = self.outstanding.lock().await;
            if self.policy == ConcurrencyPolicy::CancelSuperseded {
                for (id, signal) in outstanding.iter() {
                    info!("Cancelling run {}, superseded by {}", id, run_id);
                    signal.cancel();
                }
            }
            outstanding.push((run_id, cancel.clone()));
        }

        let (reply, report) = oneshot::channel();
        let run = PendingRun {
            workflow,
            ctx: self.base_context.for_event(event),
            cancel: cancel.clone(),
            reply,
        };

        info!("Dispatching run {} ({})", run_id, self.policy);
        match self.policy {
            ConcurrencyPolicy::Concurrent => self.spawn(run),
            ConcurrencyPolicy::Queue | ConcurrencyPolicy::CancelSuperseded => {
                if let Err(mpsc::error::SendError(run)) = self.queue.send(run) {
                    self.spawn(run);
                }
            }
        }

        Some(RunHandle {
            run_id,
            cancel,
            report,
        })
    }

    /// Cancel every queued or running run
    pub async fn cancel_all(&self) {
        for (_, signal) in self.outstanding.lock().await.iter() {
            signal.cancel();
        }
    }

    /// Runs queued or in flight
    pub async fn outstanding(&self) -> usize {
        self.outstanding.lock().await.len()
    }

    fn spawn(&self, run: PendingRun) {
        let engine = self.engine.clone();
        let outstanding = self.outstanding.clone();
        tokio::spawn(async move {
            run.execute(&engine, &outstanding).await;
        });
    }
}
