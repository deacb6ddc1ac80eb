//! Shell runner configuration

use crate::core::config::{DEFAULT_SHELL, DEFAULT_TIMEOUT_SECS};
use std::time::Duration;

/// Configuration for [`ShellRunner`](super::ShellRunner)
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Shell used for invocations that leave it empty
    pub shell: String,

    /// Timeout used for invocations with a zero timeout
    pub default_timeout: Duration,

    /// Time between SIGTERM and SIGKILL when a command is stopped
    pub kill_grace: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            kill_grace: Duration::from_secs(5),
        }
    }
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }
}
