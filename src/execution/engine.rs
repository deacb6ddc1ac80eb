//! Main execution engine - orchestrates a whole workflow run

use crate::{
    core::{
        ExecutionStatus, Job, JobState, RunContext, StepFailure, StepOutput, StepState, Workflow,
    },
    execution::{ExecutionResult, StepExecutor},
    process::{CancelSignal, CommandRunner, OutputCallback, OutputStream},
    secrets::SecretProvider,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during workflow execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    WorkflowStarted {
        run_id: Uuid,
        workflow_name: String,
        total_jobs: usize,
    },
    JobStarted {
        job_id: String,
        job_name: String,
        runs_on: String,
        total_steps: usize,
    },
    JobSkipped {
        job_id: String,
        reason: String,
    },
    StepStarted {
        job_id: String,
        step_name: String,
        /// Zero-based position in the job
        index: usize,
        total: usize,
    },
    /// One line of live output, already redacted
    StepOutput {
        job_id: String,
        step_name: String,
        stream: OutputStream,
        line: String,
    },
    StepSucceeded {
        job_id: String,
        step_name: String,
        output: StepOutput,
    },
    StepFailed {
        job_id: String,
        step_name: String,
        failure: StepFailure,
        output: StepOutput,
    },
    JobFinished {
        job_id: String,
        state: JobState,
    },
    WorkflowFinished {
        run_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Turns streamed lines into `StepOutput` events
struct EventCallback {
    handlers: Vec<EventHandler>,
    job_id: String,
    step_name: String,
}

impl OutputCallback for EventCallback {
    fn on_line(&self, stream: OutputStream, line: &str) {
        let event = ExecutionEvent::StepOutput {
            job_id: self.job_id.clone(),
            step_name: self.step_name.clone(),
            stream,
            line: line.to_string(),
        };
        for handler in &self.handlers {
            handler(event.clone());
        }
    }
}

/// Main workflow execution engine
pub struct ExecutionEngine<R> {
    executor: Arc<StepExecutor<R>>,
    event_handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl<R: CommandRunner + 'static> ExecutionEngine<R> {
    pub fn new(runner: R, secrets: Arc<dyn SecretProvider>) -> Self {
        Self {
            executor: Arc::new(StepExecutor::new(runner, secrets)),
            event_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn executor(&self) -> &StepExecutor<R> {
        &self.executor
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    async fn emit_event(&self, event: ExecutionEvent) {
        let handlers = self.event_handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Execute every job of `workflow` and return the final status.
    ///
    /// Workflow variables are overridden by the context's variables.
    pub async fn execute(
        &self,
        workflow: &mut Workflow,
        ctx: &RunContext,
        cancel: &CancelSignal,
    ) -> ExecutionStatus {
        let run_id = workflow.state.run_id;
        let ctx = self.prepare_context(workflow, ctx);

        info!(
            "Starting workflow run: {} ({}) for {} event",
            workflow.name, run_id, ctx.event.kind
        );
        self.emit_event(ExecutionEvent::WorkflowStarted {
            run_id,
            workflow_name: workflow.name.clone(),
            total_jobs: workflow.jobs.len(),
        })
        .await;

        workflow.state.start(workflow.jobs.len());

        let order = workflow.execution_order().to_vec();
        for index in order {
            let skip_reason = if cancel.is_cancelled() {
                Some("run cancelled".to_string())
            } else {
                workflow
                    .unmet_need(&workflow.jobs[index])
                    .map(|need| format!("needs '{}', which did not succeed", need))
            };

            let job = &mut workflow.jobs[index];
            match skip_reason {
                Some(reason) => self.skip_job(job, reason).await,
                None => self.execute_job(job, &ctx, cancel).await,
            }
            workflow.update_state_counts();
        }

        let status = workflow.final_status(cancel.is_cancelled());
        workflow.state.finish(status);

        info!(
            "Workflow run finished: {} - {} ({}/{} jobs succeeded)",
            workflow.name, status, workflow.state.succeeded_jobs, workflow.state.total_jobs
        );
        self.emit_event(ExecutionEvent::WorkflowFinished { run_id, status })
            .await;

        status
    }

    fn prepare_context(&self, workflow: &Workflow, ctx: &RunContext) -> RunContext {
        let mut run_ctx = ctx.clone();
        run_ctx.variables = workflow.variables.clone();
        run_ctx.variables.extend(ctx.variables.clone());

        let secrets = self.executor.secrets();
        for name in workflow.secret_names() {
            if let Some(var) = secrets.source_variable(&name) {
                if !run_ctx.secret_sources.contains(&var) {
                    run_ctx.secret_sources.push(var);
                }
            }
        }
        run_ctx
    }

    async fn skip_job(&self, job: &mut Job, reason: String) {
        warn!("Skipping job {}: {}", job.id, reason);
        job.skip_remaining_steps(&reason);
        job.state = JobState::Skipped {
            reason: reason.clone(),
        };
        self.emit_event(ExecutionEvent::JobSkipped {
            job_id: job.id.clone(),
            reason,
        })
        .await;
    }

    /// Run the steps of one job in order, stopping at the first failure
    async fn execute_job(&self, job: &mut Job, ctx: &RunContext, cancel: &CancelSignal) {
        let started_at = Utc::now();
        job.state = JobState::Running { started_at };
        let total = job.steps.len();

        info!("Starting job {} on {} ({} steps)", job.id, job.runs_on, total);
        self.emit_event(ExecutionEvent::JobStarted {
            job_id: job.id.clone(),
            job_name: job.name.clone(),
            runs_on: job.runs_on.clone(),
            total_steps: total,
        })
        .await;

        for index in 0..total {
            let step = job.steps[index].clone();
            let step_started = Utc::now();
            job.steps[index].state = StepState::Running {
                started_at: step_started,
            };

            self.emit_event(ExecutionEvent::StepStarted {
                job_id: job.id.clone(),
                step_name: step.name.clone(),
                index,
                total,
            })
            .await;

            let callback = EventCallback {
                handlers: self.event_handlers.lock().await.clone(),
                job_id: job.id.clone(),
                step_name: step.name.clone(),
            };
            let result = self
                .executor
                .execute(&step, job, ctx, Some(&callback), cancel)
                .await;
            let finished_at = Utc::now();

            match result {
                ExecutionResult::Success { output } => {
                    job.steps[index].state = StepState::Succeeded {
                        output: output.clone(),
                        started_at: step_started,
                        finished_at,
                    };
                    self.emit_event(ExecutionEvent::StepSucceeded {
                        job_id: job.id.clone(),
                        step_name: step.name.clone(),
                        output,
                    })
                    .await;
                }
                ExecutionResult::Failed { failure, output } => {
                    error!(
                        "Job {} failed at step '{}': {}",
                        job.id, step.name, failure
                    );
                    job.steps[index].state = StepState::Failed {
                        failure: failure.clone(),
                        output: output.clone(),
                        started_at: step_started,
                        finished_at,
                    };
                    job.skip_remaining_steps(&format!("step '{}' failed", step.name));
                    job.state = JobState::Failed {
                        step_index: index,
                        step_name: step.name.clone(),
                        failure: failure.clone(),
                        started_at,
                        finished_at,
                    };

                    self.emit_event(ExecutionEvent::StepFailed {
                        job_id: job.id.clone(),
                        step_name: step.name.clone(),
                        failure,
                        output,
                    })
                    .await;
                    self.emit_event(ExecutionEvent::JobFinished {
                        job_id: job.id.clone(),
                        state: job.state.clone(),
                    })
                    .await;
                    return;
                }
            }
        }

        job.state = JobState::Succeeded {
            started_at,
            finished_at: Utc::now(),
        };
        info!("Job {} succeeded", job.id);
        self.emit_event(ExecutionEvent::JobFinished {
            job_id: job.id.clone(),
            state: job.state.clone(),
        })
        .await;
    }
}
