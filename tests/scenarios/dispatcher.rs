//! Test: Dispatcher - concurrency policies for overlapping triggers

use crate::helpers::*;
use runline::core::{ExecutionStatus, JobState, RunContext, StepFailure, TriggerEvent};
use runline::execution::{ConcurrencyPolicy, Dispatcher, ExecutionEngine};
use runline::secrets::StaticSecretProvider;
use std::sync::Arc;
use std::time::Duration;

const DEPLOY: &str = r#"
name: "Deploy"
on:
  push:
    branches: ["main"]
jobs:
  - id: deploy
    steps:
      - name: "deploy"
        run: "deploy {{ event.sha }}"
"#;

fn dispatcher(
    runner: MockRunner,
    policy: ConcurrencyPolicy,
) -> (Dispatcher<MockRunner>, Arc<ExecutionEngine<MockRunner>>) {
    let engine = Arc::new(ExecutionEngine::new(
        runner,
        Arc::new(StaticSecretProvider::new()),
    ));
    let dispatcher = Dispatcher::new(
        workflow_from_yaml(DEPLOY),
        RunContext::new(TriggerEvent::manual()),
        engine.clone(),
        policy,
    );
    (dispatcher, engine)
}

fn push(sha: &str) -> TriggerEvent {
    TriggerEvent::push("main").with_sha(sha)
}

#[tokio::test]
async fn test_queue_runs_one_at_a_time_in_order() {
    let runner = MockRunner::new().on("deploy", Behavior::Sleep(Duration::from_millis(50)));
    let (dispatcher, engine) = dispatcher(runner, ConcurrencyPolicy::Queue);

    let first = dispatcher.dispatch(push("aaa")).await.unwrap();
    let second = dispatcher.dispatch(push("bbb")).await.unwrap();
    assert_ne!(first.run_id, second.run_id);

    let first = first.wait().await.unwrap();
    let second = second.wait().await.unwrap();
    assert_eq!(first.status, ExecutionStatus::Completed);
    assert_eq!(second.status, ExecutionStatus::Completed);
    assert_eq!(first.event.sha.as_deref(), Some("aaa"));

    assert_eq!(
        engine.executor().runner().timeline(),
        vec!["start:deploy aaa", "end:deploy aaa", "start:deploy bbb", "end:deploy bbb"]
    );
    assert_eq!(dispatcher.outstanding().await, 0);
}

#[tokio::test]
async fn test_cancel_superseded_stops_the_older_run() {
    let runner = MockRunner::new().on("deploy old", Behavior::Hang);
    let (dispatcher, _engine) = dispatcher(runner, ConcurrencyPolicy::CancelSuperseded);

    let old = dispatcher.dispatch(push("old")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let new = dispatcher.dispatch(push("new")).await.unwrap();

    let old = tokio::time::timeout(Duration::from_secs(5), old.wait())
        .await
        .expect("superseded run should stop")
        .unwrap();
    let new = new.wait().await.unwrap();

    assert_eq!(old.status, ExecutionStatus::Cancelled);
    assert_ne!(old.status.exit_code(), 0);
    assert_eq!(new.status, ExecutionStatus::Completed);

    match &old.workflow.job("deploy").unwrap().state {
        JobState::Failed { failure, .. } => assert_eq!(failure, &StepFailure::Cancelled),
        JobState::Skipped { .. } => {}
        other => panic!("unexpected state for superseded job: {:?}", other),
    }
}

#[tokio::test]
async fn test_concurrent_runs_overlap() {
    let runner = MockRunner::new().on("deploy", Behavior::Sleep(Duration::from_millis(200)));
    let (dispatcher, engine) = dispatcher(runner, ConcurrencyPolicy::Concurrent);

    let first = dispatcher.dispatch(push("one")).await.unwrap();
    let second = dispatcher.dispatch(push("two")).await.unwrap();

    assert_eq!(first.wait().await.unwrap().status, ExecutionStatus::Completed);
    assert_eq!(second.wait().await.unwrap().status, ExecutionStatus::Completed);

    let timeline = engine.executor().runner().timeline();
    assert!(timeline[0].starts_with("start:"));
    assert!(timeline[1].starts_with("start:"), "runs did not overlap: {:?}", timeline);
}

#[tokio::test]
async fn test_non_matching_event_starts_nothing() {
    let (dispatcher, engine) = dispatcher(MockRunner::new(), ConcurrencyPolicy::Queue);

    assert!(dispatcher.dispatch(TriggerEvent::push("develop")).await.is_none());
    assert!(dispatcher.dispatch(TriggerEvent::pull_request("main")).await.is_none());
    assert_eq!(dispatcher.outstanding().await, 0);
    assert!(engine.executor().runner().calls().is_empty());
}

#[tokio::test]
async fn test_cancel_all_stops_running_and_queued_runs() {
    let runner = MockRunner::new().on("deploy", Behavior::Hang);
    let (dispatcher, _engine) = dispatcher(runner, ConcurrencyPolicy::Queue);

    let running = dispatcher.dispatch(push("one")).await.unwrap();
    let queued = dispatcher.dispatch(push("two")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    dispatcher.cancel_all().await;

    let running = tokio::time::timeout(Duration::from_secs(5), running.wait())
        .await
        .unwrap()
        .unwrap();
    let queued = tokio::time::timeout(Duration::from_secs(5), queued.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(running.status, ExecutionStatus::Cancelled);
    assert_eq!(queued.status, ExecutionStatus::Cancelled);
}
