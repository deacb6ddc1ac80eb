//! Running step commands as child processes

pub mod cancel;
pub mod config;
pub mod response;
pub mod shell;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

pub use cancel::CancelSignal;
pub use config::RunnerConfig;
pub use response::{CommandOutput, OutputStream, ProcessError, Termination};
pub use shell::ShellRunner;

/// Everything needed to start one step command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Shell program the script is passed to
    pub shell: String,

    /// Script text, passed to the shell as a single argument
    pub script: String,

    /// Directory the child starts in; inherits the runner's when absent
    pub working_dir: Option<PathBuf>,

    /// Variables set in the child environment
    pub env: BTreeMap<String, String>,

    /// Variables removed from the inherited environment before `env` is applied
    pub env_remove: Vec<String>,

    /// Written to the child's stdin, which is then closed
    pub stdin: Option<String>,

    /// Wall-clock limit
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(shell: impl Into<String>, script: impl Into<String>, timeout: Duration) -> Self {
        Self {
            shell: shell.into(),
            script: script.into(),
            working_dir: None,
            env: BTreeMap::new(),
            env_remove: Vec::new(),
            stdin: None,
            timeout,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }
}

/// Receives command output line by line while it runs
///
/// Object-safe; passed around as `Option<&dyn OutputCallback>`.
pub trait OutputCallback: Send + Sync {
    /// Called for every line, including its trailing newline if it had one
    fn on_line(&self, stream: OutputStream, line: &str);
}

/// Callback that discards every line
#[derive(Debug, Clone, Default)]
pub struct NoopCallback;

impl OutputCallback for NoopCallback {
    fn on_line(&self, _stream: OutputStream, _line: &str) {}
}

/// Runs step commands; implemented by [`ShellRunner`] and by test doubles
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `invocation` to completion, its timeout, or cancellation.
    ///
    /// A non-zero exit, timeout or cancellation is reported through
    /// [`CommandOutput::termination`]; `Err` means the command could not be
    /// run at all.
    async fn run(
        &self,
        invocation: &Invocation,
        callback: Option<&dyn OutputCallback>,
        cancel: &CancelSignal,
    ) -> Result<CommandOutput, ProcessError>;
}
