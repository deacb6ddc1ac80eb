//! Test: Lint pipeline - a failing formatter check fails the job

use crate::helpers::*;
use runline::core::{ExecutionStatus, StepFailure, StepState, TriggerEvent};
use runline::persistence::create_summary;
use runline::secrets::StaticSecretProvider;

pub const LINT: &str = r#"
name: "Lint"
on:
  push:
    paths: ["**.py"]
  pull_request:
    paths: ["**.py"]
jobs:
  - id: lint
    runs_on: ubuntu-latest
    steps:
      - name: "Checkout"
        run: "git checkout"
      - name: "Setup Python"
        run: "setup-python 3.11"
      - name: "Install formatter"
        run: "pip install black"
      - name: "Run formatter --check ."
        run: "black --check ."
"#;

#[tokio::test]
async fn test_lint_passes_when_formatter_passes() {
    let runner = MockRunner::new().print_on("black --check", "All done! 12 files left unchanged.\n");

    let result = run_workflow(
        LINT,
        runner,
        StaticSecretProvider::new(),
        TriggerEvent::push("main").with_paths(["src/app.py"]),
    )
    .await;

    assert_completed(&result);
    assert_ran(
        &result,
        &["git checkout", "setup-python 3.11", "pip install black", "black --check ."],
    );
    assert_eq!(result.workflow.exit_code(), 0);

    let output = result
        .step_state("lint", "Run formatter --check .")
        .output()
        .unwrap();
    assert!(output.stdout.contains("left unchanged"));
}

#[tokio::test]
async fn test_lint_fails_at_formatter_step() {
    let runner = MockRunner::new().fail_on(
        "black --check",
        1,
        "would reformat src/app.py\nOh no! 1 file would be reformatted.\n",
    );

    let result = run_workflow(
        LINT,
        runner,
        StaticSecretProvider::new(),
        TriggerEvent::pull_request("main").with_paths(["src/app.py"]),
    )
    .await;

    assert_failed(&result);
    assert_job_failed_at(
        &result,
        "lint",
        "Run formatter --check .",
        StepFailure::ExitCode { code: 1 },
    );
    assert_step_succeeded(&result, "lint", "Install formatter");

    let job = result.workflow.job("lint").unwrap();
    let failed = job.failed_step().unwrap();
    assert_eq!(failed.index, 3);
    assert_eq!(failed.exit_code(), Some(1));
    assert!(failed.output.combined.contains("would reformat src/app.py"));
    assert_eq!(result.workflow.state.failed_jobs, 1);
    assert_eq!(result.workflow.exit_code(), 1);
}

#[tokio::test]
async fn test_failure_recorded_in_summary() {
    let runner = MockRunner::new().fail_on("black --check", 1, "would reformat\n");
    let event = TriggerEvent::push("main").with_paths(["a.py"]);

    let result = run_workflow(LINT, runner, StaticSecretProvider::new(), event.clone()).await;
    let summary = create_summary(&result.workflow, &event);

    assert_eq!(summary.status, ExecutionStatus::Failed);
    assert_eq!(summary.event_kind, "push");
    assert_eq!(summary.failing_job.as_deref(), Some("lint"));
    assert_eq!(summary.failing_step.as_deref(), Some("Run formatter --check ."));
    assert_eq!(summary.exit_code, Some(1));
    assert!(summary.completed_at.is_some());
}

#[tokio::test]
async fn test_early_failure_skips_rest_of_job() {
    let runner = MockRunner::new().fail_on("pip install", 2, "network unreachable\n");

    let result = run_workflow(
        LINT,
        runner,
        StaticSecretProvider::new(),
        TriggerEvent::manual(),
    )
    .await;

    assert_failed(&result);
    assert_ran(&result, &["git checkout", "setup-python 3.11", "pip install black"]);
    assert_job_failed_at(
        &result,
        "lint",
        "Install formatter",
        StepFailure::ExitCode { code: 2 },
    );
    assert_eq!(result.workflow.exit_code(), 2);
    match result.step_state("lint", "Run formatter --check .") {
        StepState::Skipped { reason } => assert!(reason.contains("Install formatter")),
        other => panic!("expected skipped, got {:?}", other),
    }
}
