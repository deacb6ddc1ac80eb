//! Step executor - renders a step, injects its secrets and runs its command

use crate::{
    core::{render_env, Job, RunContext, Step, StepFailure, StepOutput},
    process::{
        CancelSignal, CommandRunner, Invocation, OutputCallback, OutputStream, Termination,
    },
    secrets::{Redactor, SecretProvider},
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Result of executing a step
#[derive(Debug, Clone)]
pub enum ExecutionResult {
    /// Command exited 0
    Success { output: StepOutput },
    /// Anything else; the job stops here
    Failed {
        failure: StepFailure,
        output: StepOutput,
    },
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }

    pub fn output(&self) -> &StepOutput {
        match self {
            ExecutionResult::Success { output } | ExecutionResult::Failed { output, .. } => output,
        }
    }

    fn failed(failure: StepFailure) -> Self {
        ExecutionResult::Failed {
            failure,
            output: StepOutput::default(),
        }
    }
}

/// Forwards lines to the inner callback with secret values masked
struct RedactingCallback<'a> {
    inner: Option<&'a dyn OutputCallback>,
    redactor: &'a Redactor,
}

impl OutputCallback for RedactingCallback<'_> {
    fn on_line(&self, stream: OutputStream, line: &str) {
        if let Some(inner) = self.inner {
            inner.on_line(stream, &self.redactor.redact(line));
        }
    }
}

/// Executes a single step
pub struct StepExecutor<R> {
    runner: R,
    secrets: Arc<dyn SecretProvider>,
}

impl<R: CommandRunner> StepExecutor<R> {
    pub fn new(runner: R, secrets: Arc<dyn SecretProvider>) -> Self {
        Self { runner, secrets }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn secrets(&self) -> &dyn SecretProvider {
        self.secrets.as_ref()
    }

    /// Execute a step of `job` and classify the outcome
    pub async fn execute(
        &self,
        step: &Step,
        job: &Job,
        ctx: &RunContext,
        callback: Option<&dyn OutputCallback>,
        cancel: &CancelSignal,
    ) -> ExecutionResult {
        info!("Executing step: {} (job {})", step.name, job.id);

        if cancel.is_cancelled() {
            info!("Step {} not started: run cancelled", step.name);
            return ExecutionResult::failed(StepFailure::Cancelled);
        }

        let mut variables = ctx.get_rendering_variables(&job.id, &job.runs_on);

        // Acquired for this step only; dropped when it returns
        let mut secret_env = BTreeMap::new();
        for (env_name, secret_name) in &step.secrets {
            match self.secrets.acquire(secret_name) {
                Ok(value) => {
                    ctx.redactor.register(value.expose());
                    variables.insert(format!("secrets.{}", secret_name), value.expose().to_string());
                    secret_env.insert(env_name.clone(), value.expose().to_string());
                }
                Err(e) => {
                    error!("Step {}: {}", step.name, e);
                    return ExecutionResult::failed(StepFailure::Secret {
                        message: e.to_string(),
                    });
                }
            }
        }

        let (rendered, job_env) = match step
            .render(&variables)
            .and_then(|rendered| render_env(&job.env, &variables).map(|env| (rendered, env)))
        {
            Ok(pair) => pair,
            Err(e) => {
                error!("Step {}: {}", step.name, e);
                return ExecutionResult::failed(StepFailure::Template {
                    message: e.to_string(),
                });
            }
        };
        debug!(
            "Command for step {}: {}",
            step.name,
            ctx.redactor.redact(&rendered.run)
        );

        let mut env = job_env;
        env.extend(rendered.env);
        env.extend(secret_env);

        let working_dir = match rendered.working_directory {
            Some(dir) => ctx.workspace.join(dir),
            None => ctx.workspace.clone(),
        };

        let mut invocation = Invocation::new(
            step.shell.clone(),
            rendered.run,
            Duration::from_secs(step.timeout_secs),
        )
        .with_working_dir(working_dir);
        invocation.env = env;
        invocation.env_remove = ctx.secret_sources.clone();
        invocation.stdin = rendered.stdin;

        let redacting = RedactingCallback {
            inner: callback,
            redactor: &ctx.redactor,
        };

        let result = match self.runner.run(&invocation, Some(&redacting), cancel).await {
            Ok(result) => result,
            Err(e) => {
                error!("Step {} could not start: {}", step.name, e);
                return ExecutionResult::failed(StepFailure::Spawn {
                    message: e.to_string(),
                });
            }
        };

        let output = StepOutput {
            stdout: ctx.redactor.redact(&result.stdout),
            stderr: ctx.redactor.redact(&result.stderr),
            combined: ctx.redactor.redact(&result.combined),
            exit_code: result.exit_code,
        };

        let failure = match result.termination {
            Termination::Exited(0) => {
                info!("Step {} succeeded in {:?}", step.name, result.duration);
                return ExecutionResult::Success { output };
            }
            Termination::Exited(code) => StepFailure::ExitCode { code },
            Termination::TimedOut => StepFailure::Timeout {
                secs: step.timeout_secs,
            },
            Termination::Cancelled => StepFailure::Cancelled,
        };

        warn!("Step {} failed: {}", step.name, failure);
        ExecutionResult::Failed { failure, output }
    }
}
