use anyhow::{Context, Result};
use runline::cli::commands::{
    CheckTriggerCommand, HistoryCommand, ListCommand, ListenCommand, RunCommand, ValidateCommand,
};
use runline::cli::output::*;
use runline::cli::terminal_output::TerminalReporter;
use runline::cli::{Cli, Command};
use runline::core::{config::WorkflowConfig, ExecutionStatus, RunContext, TriggerEvent, Workflow};
use runline::execution::{Dispatcher, ExecutionEngine, ExecutionEvent};
use runline::persistence::{create_summary, default_store, PersistenceBackend, RunSummary};
use runline::process::{CancelSignal, RunnerConfig, ShellRunner};
use runline::secrets::EnvSecretProvider;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Lines of failing step output shown at the end of a run
const FAILURE_OUTPUT_LINES: usize = 40;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.as_str()))
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let code = match &cli.command {
        Command::Run(cmd) => run_workflow(cmd, cli.stream).await?,
        Command::Validate(cmd) => validate_workflow(cmd)?,
        Command::CheckTrigger(cmd) => check_trigger(cmd)?,
        Command::Listen(cmd) => listen(cmd, cli.stream).await?,
        Command::List(cmd) => list_workflows(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn load_config(file: &Path) -> Result<WorkflowConfig> {
    WorkflowConfig::from_file(file).context("Failed to load workflow config")
}

fn base_context(
    event: TriggerEvent,
    workspace: &Option<PathBuf>,
    variables: &[(String, String)],
) -> RunContext {
    let mut ctx = RunContext::new(event);
    if let Some(workspace) = workspace {
        ctx = ctx.with_workspace(workspace.clone());
    }
    for (key, value) in variables {
        println!(
            "{} Variable override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }
    ctx.with_variables(variables.iter().cloned().collect::<HashMap<_, _>>())
}

async fn history_store(no_history: bool) -> Option<Arc<dyn PersistenceBackend>> {
    if no_history {
        return None;
    }
    match default_store().await {
        Ok(store) => Some(store),
        Err(e) => {
            warn!("Run history disabled: {:#}", e);
            None
        }
    }
}

async fn save_history(store: &Option<Arc<dyn PersistenceBackend>>, summary: &RunSummary) {
    let Some(store) = store else {
        return;
    };
    match store.save_run(summary).await {
        Ok(()) => debug!("Saved run {} to history", summary.run_id),
        Err(e) => warn!("Failed to save run {}: {:#}", summary.run_id, e),
    }
}

fn print_failures(workflow: &Workflow) {
    for &index in workflow.execution_order() {
        let job = &workflow.jobs[index];
        let Some(failed) = job.failed_step() else {
            continue;
        };

        println!(
            "\n{} Job {} failed at step {}: {}",
            CROSS,
            style(&job.id).bold(),
            style(failed.name).red().bold(),
            failed.failure
        );
        match failed.exit_code() {
            Some(code) => println!("  Exit code: {}", style(code).red()),
            None => println!("  Exit code: {}", style("none").dim()),
        }
        if !failed.output.combined.trim().is_empty() {
            println!("  Output:");
            for line in format_output(&failed.output.combined, FAILURE_OUTPUT_LINES).lines() {
                println!("    {}", line);
            }
        }
    }
}

async fn run_workflow(cmd: &RunCommand, stream: bool) -> Result<i32> {
    let config = load_config(&cmd.file)?;
    println!("{} Loaded workflow: {}", INFO, style(&config.name).bold());

    let event = cmd.event.to_event();
    let mut workflow = config.to_workflow();

    if !workflow.trigger.matches(&event) {
        println!(
            "{} {} event does not match the trigger of {}; skipped",
            WARN,
            event.kind,
            style(&workflow.name).bold()
        );
        return Ok(0);
    }

    let ctx = base_context(event.clone(), &cmd.workspace, &cmd.variables);
    let store = history_store(cmd.no_history).await;

    let engine = ExecutionEngine::new(
        ShellRunner::new(RunnerConfig::default()),
        Arc::new(EnvSecretProvider::with_prefix(cmd.secret_prefix.clone())),
    );
    let reporter = Arc::new(TerminalReporter::new(stream));
    let handler = reporter.clone();
    engine
        .add_event_handler(move |event| handler.handle(&event))
        .await;

    let cancel = CancelSignal::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{} Interrupted, stopping the running step...", WARN);
            on_interrupt.cancel();
        }
    });

    println!();
    let status = engine.execute(&mut workflow, &ctx, &cancel).await;

    print_failures(&workflow);

    let summary = create_summary(&workflow, &event);
    save_history(&store, &summary).await;

    let elapsed = summary
        .completed_at
        .and_then(|done| done.signed_duration_since(summary.started_at).to_std().ok())
        .map(format_duration)
        .unwrap_or_default();

    if status == ExecutionStatus::Completed {
        println!(
            "\n{} {} completed {} {}",
            CHECK,
            style(&workflow.name).bold(),
            style("successfully").green(),
            style(elapsed).dim()
        );
    } else {
        println!(
            "\n{} {} {} {}",
            CROSS,
            style(&workflow.name).bold(),
            format_status(status),
            style(elapsed).dim()
        );
    }

    Ok(workflow.exit_code())
}

fn validate_workflow(cmd: &ValidateCommand) -> Result<i32> {
    println!("{} Validating workflow...", INFO);

    match WorkflowConfig::from_file(&cmd.file) {
        Ok(config) => {
            let workflow = config.to_workflow();
            println!("{} Workflow configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Jobs: {}", style(config.jobs.len()).cyan());
            println!("  Steps: {}", style(config.step_count()).cyan());
            println!("  Variables: {}", style(config.variable_count()).cyan());
            let kinds: Vec<String> = workflow
                .trigger
                .event_kinds()
                .iter()
                .map(|k| k.to_string())
                .collect();
            println!("  Triggers: {}", style(kinds.join(", ")).cyan());
            println!(
                "  Job order: {}",
                style(workflow.execution_order_ids().join(" → ")).dim()
            );

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(0)
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            Ok(1)
        }
    }
}

fn check_trigger(cmd: &CheckTriggerCommand) -> Result<i32> {
    let config = load_config(&cmd.file)?;
    let event = cmd.event.to_event();

    if config.trigger().matches(&event) {
        println!(
            "{} {} event matches {}",
            CHECK,
            event.kind,
            style(&config.name).bold()
        );
        Ok(0)
    } else {
        println!(
            "{} {} event does not match {}",
            CROSS,
            event.kind,
            style(&config.name).bold()
        );
        Ok(1)
    }
}

async fn listen(cmd: &ListenCommand, live: bool) -> Result<i32> {
    let config = load_config(&cmd.file)?;
    let workflow = config.to_workflow();
    let store = history_store(cmd.no_history).await;

    println!(
        "{} Listening for events for {} (policy: {})",
        INFO,
        style(&workflow.name).bold(),
        style(cmd.policy).cyan()
    );

    let engine = Arc::new(ExecutionEngine::new(
        ShellRunner::new(RunnerConfig::default()),
        Arc::new(EnvSecretProvider::with_prefix(cmd.secret_prefix.clone())),
    ));
    engine
        .add_event_handler(move |event| match &event {
            ExecutionEvent::StepOutput {
                job_id,
                step_name,
                line,
                ..
            } if live => {
                print!("{} {}", style(format!("[{}/{}]", job_id, step_name)).dim(), line);
            }
            _ => {
                if let Some(line) = format_execution_event(&event) {
                    println!("{}", line);
                }
            }
        })
        .await;

    let ctx = base_context(TriggerEvent::manual(), &cmd.workspace, &cmd.variables);
    let dispatcher = Dispatcher::new(workflow, ctx, engine, cmd.policy);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut handles = Vec::new();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read events from stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<TriggerEvent>(&line) {
                    Ok(event) => {
                        if let Some(handle) = dispatcher.dispatch(event).await {
                            println!("{} Queued run {}", INFO, style(handle.run_id).dim());
                            handles.push(handle);
                        }
                    }
                    Err(e) => warn!("Ignoring malformed event {:?}: {}", line, e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n{} Interrupted, cancelling outstanding runs...", WARN);
                dispatcher.cancel_all().await;
                break;
            }
        }
    }

    let mut failed = 0;
    let total = handles.len();
    for handle in handles {
        let run_id = handle.run_id;
        match handle.wait().await {
            Some(report) => {
                if report.status != ExecutionStatus::Completed {
                    print_failures(&report.workflow);
                    failed += 1;
                }
                save_history(&store, &create_summary(&report.workflow, &report.event)).await;
            }
            None => {
                warn!("Run {} ended without a report", run_id);
                failed += 1;
            }
        }
    }

    println!(
        "\n{} {} runs, {} failed",
        if failed == 0 { CHECK } else { CROSS },
        total,
        failed
    );
    Ok(if failed == 0 { 0 } else { 1 })
}

async fn list_workflows(cmd: &ListCommand) -> Result<i32> {
    let store = default_store().await?;
    let workflows = store.list_workflows().await?;

    if cmd.json {
        let mut json_data = Vec::new();
        for name in &workflows {
            let runs = store.list_runs(name).await?;
            json_data.push(serde_json::json!({
                "name": name,
                "run_count": runs.len(),
            }));
        }
        let data = serde_json::json!({ "workflows": json_data });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(0);
    }

    if workflows.is_empty() {
        println!("{} No workflows found in history", INFO);
        return Ok(0);
    }

    println!("{} Workflows in history:", INFO);
    for name in &workflows {
        if cmd.with_counts {
            let runs = store.list_runs(name).await?;
            let completed = runs
                .iter()
                .filter(|r| r.status == ExecutionStatus::Completed)
                .count();
            let failed = runs
                .iter()
                .filter(|r| r.status == ExecutionStatus::Failed)
                .count();
            println!(
                "  {} ({} runs: {} succeeded, {} failed)",
                style(name).bold(),
                style(runs.len()).cyan(),
                style(completed).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(name).bold());
        }
    }

    Ok(0)
}

async fn show_history(cmd: &HistoryCommand) -> Result<i32> {
    let store = default_store().await?;

    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(summary) => print_run_details(&summary, cmd.verbose || cmd.json)?,
            None => println!("{} Run not found", WARN),
        }
        return Ok(0);
    }

    let mut runs = match &cmd.workflow {
        Some(name) => store.list_runs(name).await?,
        None => {
            let mut all = Vec::new();
            for name in store.list_workflows().await? {
                all.extend(store.list_runs(&name).await?);
            }
            all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            all
        }
    };
    runs.truncate(cmd.limit);

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(0);
    }

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(0);
    }

    println!("{} Run history (latest {}):", INFO, runs.len());
    for summary in &runs {
        println!("  {}", format_run_summary(summary));
    }

    Ok(0)
}

fn print_run_details(summary: &RunSummary, verbose: bool) -> Result<()> {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Workflow: {}", style(&summary.workflow_name).bold());
    println!("  Event: {}", summary.event_kind);
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Jobs: {} succeeded, {} failed, {} skipped of {}",
        style(summary.succeeded_jobs).green(),
        style(summary.failed_jobs).red(),
        style(summary.skipped_jobs).dim(),
        summary.total_jobs
    );
    if let (Some(job), Some(step)) = (&summary.failing_job, &summary.failing_step) {
        println!(
            "  Failed at: {}/{} (exit code {})",
            style(job).bold(),
            style(step).red(),
            summary
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "none".to_string())
        );
    }

    if verbose {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}
