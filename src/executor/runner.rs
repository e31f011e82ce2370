//! Shell command runner
//!
//! Runs validated commands under `sh -c` in the repository root:
//!
//! ```text
//! ValidatedCommand ──► sh -c (own process group) ──► stdout ─► capped buffer
//!                                 │                  stderr ─► capped buffer
//!                                 │
//!              select! { exit | timeout | cancel }
//!                                 │
//!                        any outcome ─► killpg(SIGKILL)
//! ```
//!
//! A non-zero exit is a normal result. Only spawn failures and cancellation
//! are errors.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::metrics::COMMAND_DURATION;
use crate::security::ValidatedCommand;

/// Default wall-clock limit for one command
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default per-stream output ceiling (100 KiB)
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 100 * 1024;

/// Exit code reported when the process did not exit on its own
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// How long to wait for the pipes to drain after a kill
const DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed waiting for command: {0}")]
    Wait(#[source] std::io::Error),
    #[error("command cancelled")]
    Cancelled,
}

/// Outcome of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub timed_out: bool,
}

impl CommandResult {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Stdout followed by stderr, separated by a newline when both exist
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }

    /// Render for the model: the command, its streams, and how it ended.
    pub fn format_result(&self) -> String {
        let mut out = format!("$ {}\n", self.command);

        if !self.stdout.is_empty() {
            out.push_str(&self.stdout);
            if !self.stdout.ends_with('\n') {
                out.push('\n');
            }
        }

        if !self.stderr.is_empty() {
            out.push_str("STDERR:\n");
            out.push_str(&self.stderr);
            if !self.stderr.ends_with('\n') {
                out.push('\n');
            }
        }

        if self.timed_out {
            out.push_str("\n[Command timed out]\n");
        } else if self.exit_code != 0 {
            out.push_str(&format!("\n[Exit code: {}]\n", self.exit_code));
        }

        out.push_str(&format!("[Duration: {}]\n", format_duration(self.duration)));
        out
    }
}

fn format_duration(d: Duration) -> String {
    if d < Duration::from_secs(1) {
        format!("{}ms", d.as_millis())
    } else {
        format!("{:.3}s", d.as_secs_f64())
    }
}

/// Runs validated commands inside one repository
#[derive(Debug, Clone)]
pub struct CommandRunner {
    repo_path: PathBuf,
    max_output_bytes: usize,
}

enum Outcome {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
}

impl CommandRunner {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    pub fn with_max_output_bytes(mut self, max_output_bytes: usize) -> Self {
        self.max_output_bytes = max_output_bytes;
        self
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Run a validated command.
    ///
    /// The process group is killed once `sh` returns, so background jobs
    /// never outlive the call. On timeout the partial output is returned
    /// with `timed_out = true`. On cancellation the group is
    /// killed and `RunnerError::Cancelled` is returned.
    pub async fn run(
        &self,
        command: &ValidatedCommand,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<CommandResult, RunnerError> {
        let start = Instant::now();

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command.as_str())
            .current_dir(&self.repo_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let pid = child.id();
        let stdout_buf = Arc::new(Mutex::new(Vec::new()));
        let stderr_buf = Arc::new(Mutex::new(Vec::new()));

        let mut readers = Vec::with_capacity(2);
        if let Some(pipe) = child.stdout.take() {
            readers.push(tokio::spawn(drain_capped(
                pipe,
                stdout_buf.clone(),
                self.max_output_bytes,
            )));
        }
        if let Some(pipe) = child.stderr.take() {
            readers.push(tokio::spawn(drain_capped(
                pipe,
                stderr_buf.clone(),
                self.max_output_bytes,
            )));
        }

        let outcome = tokio::select! {
            status = child.wait() => Outcome::Exited(status.map_err(RunnerError::Wait)?),
            _ = tokio::time::sleep(timeout) => Outcome::TimedOut,
            _ = cancel.cancelled() => Outcome::Cancelled,
        };

        // Background jobs outlive `sh`; the group goes down with it either way.
        kill_group(pid);
        if !matches!(outcome, Outcome::Exited(_)) {
            if let Err(e) = child.kill().await {
                debug!(error = %e, "child already gone after group kill");
            }
        }

        for mut reader in readers {
            if tokio::time::timeout(DRAIN_GRACE, &mut reader).await.is_err() {
                warn!(command = %command, "output pipe still open after process exit");
                reader.abort();
            }
        }

        let duration = start.elapsed();
        let (exit_code, timed_out) = match outcome {
            Outcome::Exited(status) => (status.code().unwrap_or(TIMEOUT_EXIT_CODE), false),
            Outcome::TimedOut => (TIMEOUT_EXIT_CODE, true),
            Outcome::Cancelled => {
                debug!(command = %command, "command cancelled");
                return Err(RunnerError::Cancelled);
            }
        };

        let status = if timed_out {
            "timeout"
        } else if exit_code == 0 {
            "success"
        } else {
            "failure"
        };
        COMMAND_DURATION
            .with_label_values(&[status])
            .observe(duration.as_secs_f64());

        debug!(
            command = %command,
            exit_code,
            timed_out,
            duration_ms = duration.as_millis() as u64,
            "command finished"
        );

        let stdout = String::from_utf8_lossy(&lock(&stdout_buf)).into_owned();
        let stderr = String::from_utf8_lossy(&lock(&stderr_buf)).into_owned();
        Ok(CommandResult {
            command: command.to_string(),
            exit_code,
            stdout,
            stderr,
            duration,
            timed_out,
        })
    }
}

fn kill_group(pid: Option<u32>) {
    let Some(pid) = pid else { return };
    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        debug!(pid, error = %e, "killpg failed");
    }
}

fn lock(buf: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Read a pipe to EOF, keeping at most `cap` bytes. Excess is discarded but
/// still read so the child never blocks on a full pipe.
async fn drain_capped<R>(mut pipe: R, sink: Arc<Mutex<Vec<u8>>>, cap: usize)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 8192];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let mut buf = lock(&sink);
                let room = cap.saturating_sub(buf.len());
                buf.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
}
