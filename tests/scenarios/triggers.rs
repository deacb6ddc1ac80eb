//! Test: Triggers - which events start which workflow

use super::build_pipeline::BUILD;
use super::lint_pipeline::LINT;
use crate::helpers::*;
use runline::core::{EventKind, TriggerEvent};

#[test]
fn test_lint_runs_for_python_changes_at_any_depth() {
    let lint = workflow_from_yaml(LINT);

    assert!(lint.trigger.matches(&TriggerEvent::push("main").with_paths(["setup.py"])));
    assert!(lint
        .trigger
        .matches(&TriggerEvent::push("feature/x").with_paths(["pkg/deep/module.py"])));
    assert!(lint
        .trigger
        .matches(&TriggerEvent::pull_request("main").with_paths(["README.md", "tools/gen.py"])));
}

#[test]
fn test_lint_ignores_changes_without_python_files() {
    let lint = workflow_from_yaml(LINT);

    assert!(!lint.trigger.matches(&TriggerEvent::push("main").with_paths(["README.md"])));
    assert!(!lint
        .trigger
        .matches(&TriggerEvent::pull_request("main").with_paths(["docs/index.md", "Dockerfile"])));
    assert!(!lint.trigger.matches(&TriggerEvent::push("main")));
}

#[test]
fn test_build_only_on_push_to_main() {
    let build = workflow_from_yaml(BUILD);

    assert!(build.trigger.matches(&TriggerEvent::push("main")));
    assert!(!build.trigger.matches(&TriggerEvent::push("develop")));
    assert!(!build.trigger.matches(&TriggerEvent::pull_request("main")));
    assert_eq!(build.trigger.event_kinds(), vec![EventKind::Push]);
}

#[test]
fn test_manual_event_bypasses_filters() {
    let lint = workflow_from_yaml(LINT);
    let build = workflow_from_yaml(BUILD);

    assert!(lint.trigger.matches(&TriggerEvent::manual()));
    assert!(build.trigger.matches(&TriggerEvent::manual()));
}

#[test]
fn test_branch_ignore_and_path_ignore() {
    let workflow = workflow_from_yaml(
        r#"
name: "Docs"
on:
  push:
    branches: ["**"]
    branches-ignore: ["release/*"]
    paths: ["docs/**"]
    paths-ignore: ["docs/drafts/**"]
jobs:
  - id: docs
    steps: [{ name: build, run: "mkdocs build" }]
"#,
    );

    assert!(workflow
        .trigger
        .matches(&TriggerEvent::push("main").with_paths(["docs/guide.md"])));
    assert!(!workflow
        .trigger
        .matches(&TriggerEvent::push("release/1.0").with_paths(["docs/guide.md"])));
    assert!(!workflow
        .trigger
        .matches(&TriggerEvent::push("main").with_paths(["docs/drafts/wip.md"])));
    assert!(workflow.trigger.matches(
        &TriggerEvent::push("main").with_paths(["docs/drafts/wip.md", "docs/published.md"])
    ));
}

#[test]
fn test_bundled_workflows_load() {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("workflows");

    let lint = runline::core::config::WorkflowConfig::from_file(dir.join("lint.yaml")).unwrap();
    assert!(lint
        .trigger()
        .matches(&TriggerEvent::pull_request("main").with_paths(["app.py"])));

    let build = runline::core::config::WorkflowConfig::from_file(dir.join("build.yaml")).unwrap();
    assert_eq!(build.step_count(), 6);
    assert!(!build.trigger().matches(&TriggerEvent::pull_request("main")));
}
