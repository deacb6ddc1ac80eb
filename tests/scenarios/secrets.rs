//! Test: Secrets - scoped to the declaring step and masked in all output

use crate::helpers::*;
use runline::core::TriggerEvent;
use runline::secrets::{EnvSecretProvider, StaticSecretProvider, REDACTED};

const PUBLISH: &str = r#"
name: "Publish"
jobs:
  - id: publish
    steps:
      - name: "before"
        run: "print-before"
      - name: "login"
        run: "registry login"
        secrets:
          REGISTRY_TOKEN: TOKEN
        stdin: "{{ secrets.TOKEN }}"
      - name: "leak"
        run: "echo-token"
        env:
          GREETING: "hello"
"#;

#[tokio::test]
async fn test_secret_reaches_only_its_step() {
    let runner = MockRunner::new();
    let secrets = StaticSecretProvider::new().with_secret("TOKEN", "s3cr3t-token");

    let result = run_workflow(PUBLISH, runner, secrets, TriggerEvent::manual()).await;
    assert_completed(&result);

    let calls = result.runner().calls();
    assert_eq!(calls.len(), 3);

    // Declaring step receives it through its env and stdin
    assert_eq!(calls[1].env.get("REGISTRY_TOKEN").map(String::as_str), Some("s3cr3t-token"));
    assert_eq!(calls[1].stdin.as_deref(), Some("s3cr3t-token"));

    // Steps before and after never see it
    for call in [&calls[0], &calls[2]] {
        assert!(!call.env.contains_key("REGISTRY_TOKEN"));
        assert!(call.env.values().all(|v| !v.contains("s3cr3t-token")));
        assert!(call.stdin.is_none());
    }
    assert_eq!(calls[2].env.get("GREETING").map(String::as_str), Some("hello"));
}

#[tokio::test]
async fn test_secret_values_are_redacted_from_output() {
    let runner = MockRunner::new()
        .on("registry login", Behavior::EchoEnv("REGISTRY_TOKEN".to_string()))
        .print_on("echo-token", "token was s3cr3t-token\n");
    let secrets = StaticSecretProvider::new().with_secret("TOKEN", "s3cr3t-token");

    let result = run_workflow(PUBLISH, runner, secrets, TriggerEvent::manual()).await;
    assert_completed(&result);

    let login = result.step_state("publish", "login").output().unwrap();
    assert_eq!(login.stdout, format!("{}\n", REDACTED));

    // Redaction outlives the step that acquired the value
    let leak = result.step_state("publish", "leak").output().unwrap();
    assert_eq!(leak.combined, format!("token was {}\n", REDACTED));

    let streamed = result.streamed_output();
    assert!(!streamed.contains("s3cr3t-token"));
    assert!(streamed.contains(REDACTED));
}

#[tokio::test]
async fn test_secret_source_variable_is_removed_from_every_step() {
    std::env::set_var("RUNLINE_SCENARIO_TOKEN", "from-the-environment");
    let secrets = EnvSecretProvider::with_prefix("RUNLINE_SCENARIO_");

    let result = run_workflow(PUBLISH, MockRunner::new(), secrets, TriggerEvent::manual()).await;
    assert_completed(&result);

    let calls = result.runner().calls();
    for call in &calls {
        assert!(
            call.env_remove.contains(&"RUNLINE_SCENARIO_TOKEN".to_string()),
            "{} still inherits the secret's source variable",
            call.script
        );
    }
    assert_eq!(
        calls[1].env.get("REGISTRY_TOKEN").map(String::as_str),
        Some("from-the-environment")
    );
}

#[tokio::test]
async fn test_empty_secret_fails_the_step() {
    let secrets = StaticSecretProvider::new().with_secret("TOKEN", "");

    let result = run_workflow(PUBLISH, MockRunner::new(), secrets, TriggerEvent::manual()).await;

    assert_failed(&result);
    assert_eq!(result.scripts(), vec!["print-before"]);
    assert_step_skipped(&result, "publish", "leak");
}
