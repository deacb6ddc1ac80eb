//! Terminal reporter for a single workflow run
//!
//! With streaming on, every step gets a header such as `[1/4] Run black`,
//! a separator the width of the terminal, and its output printed live.
//! Otherwise a progress bar tracks the job's steps and only results are shown.

use crate::cli::output::{create_progress_bar, format_execution_event, style, CHECK, CROSS};
use crate::execution::ExecutionEvent;
use crate::process::OutputStream;
use indicatif::ProgressBar;
use std::io::{self, Write};
use std::sync::Mutex;

/// Renders [`ExecutionEvent`]s for a person watching the terminal
#[derive(Debug)]
pub struct TerminalReporter {
    stream: bool,
    progress: Mutex<Option<ProgressBar>>,
}

impl TerminalReporter {
    pub fn new(stream: bool) -> Self {
        Self {
            stream,
            progress: Mutex::new(None),
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.stream
    }

    /// Handle one event
    pub fn handle(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::JobStarted { total_steps, .. } => {
                self.print_line(event);
                if !self.stream {
                    self.set_progress(Some(create_progress_bar(*total_steps)));
                }
            }
            ExecutionEvent::StepStarted {
                step_name,
                index,
                total,
                ..
            } => {
                if self.stream {
                    self.print_separator();
                    self.print_step_header(index + 1, *total, step_name);
                } else {
                    self.with_progress(|pb| pb.set_message(step_name.clone()));
                }
            }
            ExecutionEvent::StepOutput { stream, line, .. } => {
                if self.stream {
                    self.print_live(*stream, line);
                }
            }
            ExecutionEvent::StepSucceeded { step_name, .. } => {
                if self.stream {
                    println!("{} {}", CHECK, style(step_name).green());
                } else {
                    self.with_progress(|pb| {
                        pb.inc(1);
                        pb.println(format!("{} {}", CHECK, style(step_name).green()));
                    });
                }
            }
            ExecutionEvent::StepFailed {
                step_name, failure, ..
            } => {
                let line = format!("{} {}: {}", CROSS, style(step_name).red(), failure);
                match self.take_progress() {
                    Some(pb) => {
                        pb.abandon();
                        println!("{}", line);
                    }
                    None => println!("{}", line),
                }
            }
            ExecutionEvent::JobFinished { .. } => {
                if let Some(pb) = self.take_progress() {
                    pb.finish_and_clear();
                }
                self.print_line(event);
            }
            _ => self.print_line(event),
        }
    }

    fn print_line(&self, event: &ExecutionEvent) {
        if let Some(line) = format_execution_event(event) {
            println!("{}", line);
        }
    }

    /// `[N/M] Step Name`
    fn print_step_header(&self, step_num: usize, total: usize, step_name: &str) {
        println!(
            "[{}/{}] {}",
            style(step_num).cyan(),
            style(total).dim(),
            style(step_name).bold()
        );
    }

    fn print_separator(&self) {
        let width = term_size::dimensions_stdout()
            .map(|(w, _)| w)
            .unwrap_or(80);
        println!("{}", style("─".repeat(width)).dim());
    }

    fn print_live(&self, stream: OutputStream, line: &str) {
        match stream {
            OutputStream::Stdout => {
                let mut out = io::stdout().lock();
                let _ = out.write_all(line.as_bytes());
                let _ = out.flush();
            }
            OutputStream::Stderr => {
                let mut err = io::stderr().lock();
                let _ = err.write_all(line.as_bytes());
                let _ = err.flush();
            }
        }
    }

    fn set_progress(&self, pb: Option<ProgressBar>) {
        if let Ok(mut guard) = self.progress.lock() {
            *guard = pb;
        }
    }

    fn take_progress(&self) -> Option<ProgressBar> {
        self.progress.lock().ok().and_then(|mut guard| guard.take())
    }

    fn with_progress(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.progress.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }
}
