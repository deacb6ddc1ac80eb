//! Test: Variable substitution in commands, env and working directories

use crate::helpers::*;
use runline::core::{RunContext, StepFailure, TriggerEvent};
use runline::execution::ExecutionEngine;
use runline::process::CancelSignal;
use runline::secrets::StaticSecretProvider;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

const TAGGED: &str = r#"
name: "Tagged build"
variables:
  image: "holodeck"
  retries: 3
jobs:
  - id: build
    runs-on: ubuntu-latest
    env:
      IMAGE: "{{ image }}"
    steps:
      - name: "build"
        run: "docker build -t {{ image }}:{{ event.sha }} ."
        working-directory: "images/{{ image }}"
      - name: "describe"
        run: "echo {{ job.id }} on {{ job.runs_on }} for {{ event.kind }} (retries {{ retries }})"
"#;

#[tokio::test]
async fn test_variables_and_event_fields_are_rendered() {
    let result = run_workflow(
        TAGGED,
        MockRunner::new(),
        StaticSecretProvider::new(),
        TriggerEvent::push("main").with_sha("abc123"),
    )
    .await;

    assert_completed(&result);
    assert_eq!(
        result.scripts(),
        vec![
            "docker build -t holodeck:abc123 .",
            "echo build on ubuntu-latest for push (retries 3)",
        ]
    );

    let calls = result.runner().calls();
    assert_eq!(calls[0].env.get("IMAGE").map(String::as_str), Some("holodeck"));
    let dir = calls[0].working_dir.clone().unwrap();
    assert!(dir.ends_with("images/holodeck"));
}

#[tokio::test]
async fn test_overrides_win_over_workflow_variables() {
    let mut workflow = workflow_from_yaml(TAGGED);
    let engine = Arc::new(ExecutionEngine::new(
        MockRunner::new(),
        Arc::new(StaticSecretProvider::new()),
    ));

    let overrides: HashMap<String, String> =
        [("image".to_string(), "dexterity".to_string())].into_iter().collect();
    let ctx = RunContext::new(TriggerEvent::manual())
        .with_workspace(PathBuf::from("/srv/checkout"))
        .with_variables(overrides);

    engine.execute(&mut workflow, &ctx, &CancelSignal::new()).await;

    let calls = engine.executor().runner().calls();
    assert_eq!(calls[0].script, "docker build -t dexterity: .");
    assert_eq!(
        calls[0].working_dir.as_deref(),
        Some(std::path::Path::new("/srv/checkout/images/dexterity"))
    );
}

#[tokio::test]
async fn test_unknown_variable_fails_step_before_running() {
    let yaml = r#"
name: "Typo"
jobs:
  - id: deploy
    steps:
      - name: "deploy"
        run: "deploy --to {{ enviroment }}"
      - name: "notify"
        run: "notify"
"#;

    let result = run_workflow(yaml, MockRunner::new(), StaticSecretProvider::new(), TriggerEvent::manual()).await;

    assert_failed(&result);
    assert!(result.scripts().is_empty());
    assert_job_failed_at(
        &result,
        "deploy",
        "deploy",
        StepFailure::Template {
            message: "unknown variable 'enviroment'".to_string(),
        },
    );
    assert_step_skipped(&result, "deploy", "notify");
}
