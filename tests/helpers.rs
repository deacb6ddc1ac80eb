//! Test utility functions for runline

#![allow(dead_code)]

use async_trait::async_trait;
use runline::core::config::WorkflowConfig;
use runline::core::{ExecutionStatus, JobState, RunContext, StepFailure, StepState, TriggerEvent, Workflow};
use runline::execution::{ExecutionEngine, ExecutionEvent};
use runline::process::{
    CancelSignal, CommandOutput, CommandRunner, Invocation, OutputCallback, OutputStream,
    ProcessError, Termination,
};
use runline::secrets::SecretProvider;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the mock does for a script containing a given pattern
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Print `output` to stdout and exit with `code`
    Exit { code: i32, output: String },
    /// Print the value of an environment variable, then exit 0
    EchoEnv(String),
    /// Print stdin back, then exit 0
    EchoStdin,
    /// Succeed after a delay
    Sleep(Duration),
    /// Run until cancelled or timed out
    Hang,
}

/// Command runner that scripts outcomes by substring of the command text.
///
/// Scripts matching no rule print `ok` and exit 0.
#[derive(Default)]
pub struct MockRunner {
    rules: Vec<(String, Behavior)>,
    calls: Mutex<Vec<Invocation>>,
    timeline: Mutex<Vec<String>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, pattern: &str, behavior: Behavior) -> Self {
        self.rules.push((pattern.to_string(), behavior));
        self
    }

    pub fn fail_on(self, pattern: &str, code: i32, output: &str) -> Self {
        self.on(
            pattern,
            Behavior::Exit {
                code,
                output: output.to_string(),
            },
        )
    }

    pub fn print_on(self, pattern: &str, output: &str) -> Self {
        self.on(
            pattern,
            Behavior::Exit {
                code: 0,
                output: output.to_string(),
            },
        )
    }

    /// Every invocation received, in order
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Script text of every invocation, in order
    pub fn scripts(&self) -> Vec<String> {
        self.calls().into_iter().map(|i| i.script).collect()
    }

    /// `start:<script>` / `end:<script>` markers in the order they happened
    pub fn timeline(&self) -> Vec<String> {
        self.timeline.lock().unwrap().clone()
    }

    fn behavior(&self, script: &str) -> Behavior {
        self.rules
            .iter()
            .find(|(pattern, _)| script.contains(pattern.as_str()))
            .map(|(_, behavior)| behavior.clone())
            .unwrap_or(Behavior::Exit {
                code: 0,
                output: "ok\n".to_string(),
            })
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        callback: Option<&dyn OutputCallback>,
        cancel: &CancelSignal,
    ) -> Result<CommandOutput, ProcessError> {
        self.calls.lock().unwrap().push(invocation.clone());
        self.timeline
            .lock()
            .unwrap()
            .push(format!("start:{}", invocation.script));

        let output = match self.behavior(&invocation.script) {
            Behavior::Exit { code, output } => CommandOutput::exited(code, output),
            Behavior::EchoEnv(var) => {
                let value = invocation.env.get(&var).cloned().unwrap_or_default();
                CommandOutput::exited(0, format!("{}\n", value))
            }
            Behavior::EchoStdin => {
                CommandOutput::exited(0, invocation.stdin.clone().unwrap_or_default())
            }
            Behavior::Sleep(delay) => {
                tokio::time::sleep(delay).await;
                CommandOutput::exited(0, "slept\n")
            }
            Behavior::Hang => {
                let termination = tokio::select! {
                    _ = cancel.cancelled() => Termination::Cancelled,
                    _ = tokio::time::sleep(invocation.timeout) => Termination::TimedOut,
                };
                let mut output = CommandOutput::exited(0, "");
                output.termination = termination;
                output.exit_code = None;
                output
            }
        };

        if let Some(cb) = callback {
            for line in output.stdout.split_inclusive('\n') {
                cb.on_line(OutputStream::Stdout, line);
            }
        }

        self.timeline
            .lock()
            .unwrap()
            .push(format!("end:{}", invocation.script));
        Ok(output)
    }
}

/// Result of running a workflow against a [`MockRunner`]
pub struct RunResult {
    pub workflow: Workflow,
    pub status: ExecutionStatus,
    pub events: Vec<ExecutionEvent>,
    pub engine: Arc<ExecutionEngine<MockRunner>>,
}

impl RunResult {
    pub fn runner(&self) -> &MockRunner {
        self.engine.executor().runner()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.runner().scripts()
    }

    pub fn step_state(&self, job_id: &str, step_name: &str) -> &StepState {
        &self
            .workflow
            .job(job_id)
            .and_then(|job| job.step(step_name))
            .unwrap_or_else(|| panic!("no step {}/{}", job_id, step_name))
            .state
    }

    pub fn job_state(&self, job_id: &str) -> &JobState {
        &self
            .workflow
            .job(job_id)
            .unwrap_or_else(|| panic!("no job {}", job_id))
            .state
    }

    /// Every live output line seen by event handlers
    pub fn streamed_output(&self) -> String {
        self.events
            .iter()
            .filter_map(|event| match event {
                ExecutionEvent::StepOutput { line, .. } => Some(line.as_str()),
                _ => None,
            })
            .collect()
    }
}

pub fn workflow_from_yaml(yaml: &str) -> Workflow {
    WorkflowConfig::from_yaml(yaml)
        .expect("workflow yaml should be valid")
        .to_workflow()
}

/// Run `yaml` for `event`, collecting every emitted event
pub async fn run_workflow(
    yaml: &str,
    runner: MockRunner,
    secrets: impl SecretProvider + 'static,
    event: TriggerEvent,
) -> RunResult {
    let mut workflow = workflow_from_yaml(yaml);
    let engine = Arc::new(ExecutionEngine::new(runner, Arc::new(secrets)));

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine
        .add_event_handler(move |event| sink.lock().unwrap().push(event))
        .await;

    let ctx = RunContext::new(event);
    let status = engine.execute(&mut workflow, &ctx, &CancelSignal::new()).await;
    let events = events.lock().unwrap().clone();

    RunResult {
        workflow,
        status,
        events,
        engine,
    }
}

pub fn assert_completed(result: &RunResult) {
    assert_eq!(
        result.status,
        ExecutionStatus::Completed,
        "expected run to complete; ran {:?}",
        result.scripts()
    );
    assert_eq!(result.workflow.state.status, ExecutionStatus::Completed);
}

pub fn assert_failed(result: &RunResult) {
    assert_eq!(
        result.status,
        ExecutionStatus::Failed,
        "expected run to fail; ran {:?}",
        result.scripts()
    );
    assert_eq!(result.workflow.state.status, ExecutionStatus::Failed);
}

/// Assert `job_id` failed at `step_name` with `failure`
pub fn assert_job_failed_at(result: &RunResult, job_id: &str, step_name: &str, failure: StepFailure) {
    match result.job_state(job_id) {
        JobState::Failed {
            step_name: failed_at,
            failure: actual,
            ..
        } => {
            assert_eq!(failed_at, step_name, "job {} failed at the wrong step", job_id);
            assert_eq!(actual, &failure);
        }
        other => panic!("expected job {} to fail, got {:?}", job_id, other),
    }
}

pub fn assert_step_skipped(result: &RunResult, job_id: &str, step_name: &str) {
    assert!(
        matches!(result.step_state(job_id, step_name), StepState::Skipped { .. }),
        "expected {}/{} to be skipped, got {:?}",
        job_id,
        step_name,
        result.step_state(job_id, step_name)
    );
}

pub fn assert_step_succeeded(result: &RunResult, job_id: &str, step_name: &str) {
    assert!(
        matches!(result.step_state(job_id, step_name), StepState::Succeeded { .. }),
        "expected {}/{} to succeed, got {:?}",
        job_id,
        step_name,
        result.step_state(job_id, step_name)
    );
}

pub fn assert_ran(result: &RunResult, expected: &[&str]) {
    assert_eq!(result.scripts(), expected, "unexpected commands ran");
}
