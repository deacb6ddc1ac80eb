//! CLI output formatting

use crate::{
    core::{ExecutionStatus, JobState},
    execution::ExecutionEvent,
    persistence::RunSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Create a progress bar over a job's steps
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    if let Ok(template) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        progress.set_style(template.progress_chars("#>-"));
    }
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a job state for display
pub fn format_job_state(state: &JobState) -> String {
    match state {
        JobState::Pending => style("PENDING").dim().to_string(),
        JobState::Running { .. } => style("RUNNING").yellow().to_string(),
        JobState::Succeeded { .. } => style("SUCCEEDED").green().to_string(),
        JobState::Failed { step_name, .. } => {
            format!("{} at {}", style("FAILED").red(), style(step_name).bold())
        }
        JobState::Skipped { reason } => format!("{} ({})", style("SKIPPED").dim(), reason),
    }
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
        ExecutionStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

/// Format a run summary as one history line
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        ExecutionStatus::Completed => CHECK,
        ExecutionStatus::Failed => CROSS,
        ExecutionStatus::Running => SPINNER,
        _ => INFO,
    };

    let failure = match (&summary.failing_job, &summary.failing_step) {
        (Some(job), Some(step)) => format!(
            " - failed at {}/{}{}",
            job,
            step,
            summary
                .exit_code
                .map(|code| format!(" (exit {})", code))
                .unwrap_or_default()
        ),
        _ => String::new(),
    };

    format!(
        "{} {} - {} - {} [{}] ({}/{} jobs){} - {}",
        status_icon,
        style(short_id(&summary.run_id)).dim(),
        style(&summary.workflow_name).bold(),
        format_status(summary.status),
        summary.event_kind,
        summary.succeeded_jobs,
        summary.total_jobs,
        style(failure).red(),
        style(summary.started_at.format("%Y-%m-%d %H:%M:%S")).dim()
    )
}

/// Format an execution event as a single log line; `None` for live output
pub fn format_execution_event(event: &ExecutionEvent) -> Option<String> {
    let line = match event {
        ExecutionEvent::WorkflowStarted {
            run_id,
            workflow_name,
            total_jobs,
        } => format!(
            "{} Starting workflow {} ({}, {} jobs)",
            ROCKET,
            style(workflow_name).bold(),
            style(short_id(run_id)).dim(),
            total_jobs
        ),
        ExecutionEvent::JobStarted {
            job_id, runs_on, ..
        } => format!("{} Job {} on {}", SPINNER, style(job_id).cyan(), style(runs_on).dim()),
        ExecutionEvent::JobSkipped { job_id, reason } => {
            format!("{} Job {} skipped: {}", SKIP, style(job_id).dim(), reason)
        }
        ExecutionEvent::StepStarted {
            job_id,
            step_name,
            index,
            total,
        } => format!(
            "  [{}/{}] {}: {}",
            index + 1,
            total,
            style(job_id).dim(),
            style(step_name).bold()
        ),
        ExecutionEvent::StepOutput { .. } => return None,
        ExecutionEvent::StepSucceeded { step_name, .. } => {
            format!("  {} {}", CHECK, style(step_name).green())
        }
        ExecutionEvent::StepFailed {
            step_name, failure, ..
        } => format!("  {} {}: {}", CROSS, style(step_name).red(), failure),
        ExecutionEvent::JobFinished { job_id, state } => {
            format!("{} Job {} {}", INFO, style(job_id).bold(), format_job_state(state))
        }
        ExecutionEvent::WorkflowFinished { run_id, status } => format!(
            "{} Run {} {}",
            INFO,
            style(short_id(run_id)).dim(),
            format_status(*status)
        ),
    };
    Some(line)
}

/// Keep the last `max_lines` lines of output
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.trim_end().to_string()
    } else {
        let kept = lines[lines.len() - max_lines..].join("\n");
        format!(
            "{}\n{}",
            style(format!("... ({} earlier lines)", lines.len() - max_lines)).dim(),
            kept
        )
    }
}

/// Human-readable duration
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
