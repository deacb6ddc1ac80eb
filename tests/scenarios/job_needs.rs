//! Test: Job needs - ordering and skipping across jobs

use crate::helpers::*;
use runline::core::{JobState, TriggerEvent};
use runline::secrets::StaticSecretProvider;

const RELEASE: &str = r#"
name: "Release"
jobs:
  - id: publish
    needs: [build, test]
    steps: [{ name: publish, run: "publish" }]
  - id: test
    needs: [build]
    steps: [{ name: test, run: "test" }]
  - id: build
    steps: [{ name: build, run: "build" }]
  - id: docs
    steps: [{ name: docs, run: "docs" }]
"#;

#[tokio::test]
async fn test_jobs_run_after_their_needs() {
    let result = run_workflow(RELEASE, MockRunner::new(), StaticSecretProvider::new(), TriggerEvent::manual()).await;

    assert_completed(&result);
    let scripts = result.scripts();
    let position = |s: &str| scripts.iter().position(|x| x == s).unwrap();
    assert!(position("build") < position("test"));
    assert!(position("test") < position("publish"));
    assert_eq!(scripts.len(), 4);
    assert_eq!(result.workflow.state.succeeded_jobs, 4);
}

#[tokio::test]
async fn test_failed_need_skips_dependents_only() {
    let runner = MockRunner::new().fail_on("test", 1, "2 tests failed\n");

    let result = run_workflow(RELEASE, runner, StaticSecretProvider::new(), TriggerEvent::manual()).await;

    assert_failed(&result);
    assert!(result.job_state("build").is_succeeded());
    assert!(result.job_state("docs").is_succeeded());
    assert!(matches!(result.job_state("test"), JobState::Failed { .. }));
    match result.job_state("publish") {
        JobState::Skipped { reason } => assert!(reason.contains("test")),
        other => panic!("expected publish to be skipped, got {:?}", other),
    }
    assert_step_skipped(&result, "publish", "publish");
    assert!(!result.scripts().contains(&"publish".to_string()));

    assert_eq!(result.workflow.state.failed_jobs, 1);
    assert_eq!(result.workflow.state.skipped_jobs, 1);
}

#[test]
fn test_needs_cycle_is_rejected() {
    let err = runline::core::config::WorkflowConfig::from_yaml(
        r#"
name: "Cycle"
jobs:
  - id: a
    needs: [b]
    steps: [{ name: a, run: "a" }]
  - id: b
    needs: [a]
    steps: [{ name: b, run: "b" }]
"#,
    )
    .unwrap_err();
    assert!(format!("{:#}", err).contains("Cycle detected"));
}

#[test]
fn test_unknown_need_is_rejected() {
    let err = runline::core::config::WorkflowConfig::from_yaml(
        r#"
name: "Dangling"
jobs:
  - id: a
    needs: [missing]
    steps: [{ name: a, run: "a" }]
"#,
    )
    .unwrap_err();
    assert!(format!("{:#}", err).contains("missing"));
}
