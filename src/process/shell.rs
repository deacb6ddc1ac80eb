//! Shell subprocess runner - runs step scripts through `<shell> -c`

use crate::process::{
    CancelSignal, CommandOutput, CommandRunner, Invocation, OutputCallback, OutputStream,
    ProcessError, RunnerConfig, Termination,
};
use async_trait::async_trait;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Runs invocations as `<shell> -c <script>` child processes
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    config: RunnerConfig,
}

impl ShellRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    fn build_command(&self, invocation: &Invocation) -> (String, Command) {
        let shell = if invocation.shell.is_empty() {
            self.config.shell.clone()
        } else {
            invocation.shell.clone()
        };

        let mut command = Command::new(&shell);
        command
            .arg(script_flag(&shell))
            .arg(&invocation.script)
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }
        for key in &invocation.env_remove {
            command.env_remove(key);
        }
        command.envs(&invocation.env);

        // Own process group, so the whole tree can be signalled
        #[cfg(unix)]
        command.process_group(0);

        (shell, command)
    }

    /// SIGTERM the child's group, then SIGKILL after the grace period
    async fn terminate(&self, child: &mut Child, pid: Option<u32>) -> Option<ExitStatus> {
        #[cfg(unix)]
        if let Some(pid) = pid {
            signal_group(pid, libc::SIGTERM);
            let status = tokio::time::timeout(self.config.kill_grace, child.wait()).await;
            signal_group(pid, libc::SIGKILL);
            if let Ok(Ok(status)) = status {
                return Some(status);
            }
        }
        #[cfg(not(unix))]
        let _ = pid;

        if let Err(e) = child.start_kill() {
            debug!("start_kill after termination: {}", e);
        }
        child.wait().await.ok()
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        callback: Option<&dyn OutputCallback>,
        cancel: &CancelSignal,
    ) -> Result<CommandOutput, ProcessError> {
        let (shell, mut command) = self.build_command(invocation);
        let timeout = if invocation.timeout.is_zero() {
            self.config.default_timeout
        } else {
            invocation.timeout
        };

        debug!(
            "Spawning {} with script of {} bytes (timeout {:?})",
            shell,
            invocation.script.len(),
            timeout
        );

        let started = Instant::now();
        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: shell.clone(),
            source,
        })?;
        let pid = child.id();

        if let (Some(input), Some(mut stdin)) = (invocation.stdin.clone(), child.stdin.take()) {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        warn!("Failed to write stdin: {}", e);
                    }
                }
                // stdin drops here and the child sees EOF
            });
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, OutputStream::Stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, OutputStream::Stderr, tx.clone());
        }
        drop(tx);

        let mut output = CommandOutput {
            termination: Termination::Exited(0),
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            combined: String::new(),
            duration: Default::default(),
        };
        let mut stopped: Option<Termination> = None;
        let mut status: Option<ExitStatus> = None;
        let mut streams_open = true;

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        while status.is_none() || streams_open {
            tokio::select! {
                line = rx.recv(), if streams_open => match line {
                    Some((stream, line)) => {
                        if let Some(cb) = callback {
                            cb.on_line(stream, &line);
                        }
                        output.push_line(stream, &line);
                    }
                    None => streams_open = false,
                },
                result = child.wait(), if status.is_none() => {
                    status = Some(result?);
                }
                _ = &mut deadline, if stopped.is_none() => {
                    warn!("Command exceeded timeout of {:?}, terminating", timeout);
                    stopped = Some(Termination::TimedOut);
                    if let Some(s) = self.terminate(&mut child, pid).await {
                        status.get_or_insert(s);
                    }
                }
                _ = cancel.cancelled(), if stopped.is_none() => {
                    warn!("Run cancelled, terminating command");
                    stopped = Some(Termination::Cancelled);
                    if let Some(s) = self.terminate(&mut child, pid).await {
                        status.get_or_insert(s);
                    }
                }
            }
        }

        output.exit_code = status.and_then(exit_code);
        output.termination = match stopped {
            Some(termination) => termination,
            None => Termination::Exited(output.exit_code.unwrap_or(-1)),
        };
        output.duration = started.elapsed();

        debug!(
            "Command finished: {:?} after {:?} ({} bytes of output)",
            output.termination,
            output.duration,
            output.combined.len()
        );

        Ok(output)
    }
}

/// Flag that makes `shell` run its next argument as a script
fn script_flag(shell: &str) -> &'static str {
    let name = Path::new(shell)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(shell)
        .to_ascii_lowercase();
    match name.as_str() {
        "cmd" => "/C",
        "powershell" | "pwsh" => "-Command",
        _ => "-c",
    }
}

fn spawn_reader<R>(
    reader: R,
    stream: OutputStream,
    tx: mpsc::UnboundedSender<(OutputStream, String)>,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    if tx.send((stream, line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Error reading {:?}: {}", stream, e);
                    break;
                }
            }
        }
    });
}

fn exit_code(status: ExitStatus) -> Option<i32> {
    if let Some(code) = status.code() {
        return Some(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status.signal().map(|signal| 128 + signal)
    }
    #[cfg(not(unix))]
    {
        None
    }
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: killpg only delivers a signal; an already-gone group yields ESRCH
    unsafe {
        libc::killpg(pgid, signal);
    }
}
