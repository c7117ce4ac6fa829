//! Analysis engine subprocess adapter
//!
//! Runs `<program> [fixed args...] <staged path>` and captures its output.
//! The engine may print any number of diagnostic lines before its final
//! result line; this module returns stdout unparsed so that changes in the
//! engine's logging never affect how it is invoked.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::models::MediaKind;

/// Stderr bytes kept in error values and logs
const STDERR_EXCERPT_LEN: usize = 2048;

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Process could not be started (binary missing, permission denied)
    #[error("Failed to launch analysis engine {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Process exited unsuccessfully
    #[error("Analysis engine exited with status {exit_code:?}: {stderr}")]
    Execution {
        /// `None` when terminated by a signal
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Wall-clock budget exceeded; the process was killed
    #[error("Analysis engine timed out after {budget:?}")]
    Timeout { budget: Duration },

    /// Worker pool closed
    #[error("Analysis engine pool is closed")]
    PoolClosed,
}

/// Program plus fixed leading arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl EngineCommand {
    /// Build from an argv list; `None` when the list is empty
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        if program.trim().is_empty() {
            return None;
        }
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

/// Captured result of one engine run
#[derive(Debug, Clone)]
pub struct EngineInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

/// Something that can analyze a staged media file
///
/// The orchestrator only sees this trait, so a long-lived worker backend
/// can replace the spawn-per-request [`ProcessEngine`].
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    async fn invoke(&self, kind: MediaKind, staged_path: &Path) -> Result<EngineInvocation, EngineError>;
}

/// Engine adapter configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub audio: EngineCommand,
    pub video: EngineCommand,
    pub working_dir: Option<PathBuf>,
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

/// Spawns one engine process per analysis
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    config: EngineConfig,
}

impl ProcessEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    fn command_for(&self, kind: MediaKind) -> &EngineCommand {
        match kind {
            MediaKind::Audio => &self.config.audio,
            MediaKind::Video => &self.config.video,
        }
    }
}

#[async_trait]
impl AnalysisEngine for ProcessEngine {
    async fn invoke(&self, kind: MediaKind, staged_path: &Path) -> Result<EngineInvocation, EngineError> {
        let command = self.command_for(kind);
        let budget = self.config.timeout;
        let limit = self.config.max_output_bytes;
        let started = Instant::now();

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .arg(staged_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Caller cancellation drops the future; take the child down with it
            .kill_on_drop(true);
        // Own process group, so helpers the engine starts (ffmpeg) can be killed with it
        #[cfg(unix)]
        cmd.process_group(0);
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(
            program = %command.program,
            kind = %kind,
            staged_path = %staged_path.display(),
            "Launching analysis engine"
        );

        let mut child = cmd.spawn().map_err(|source| EngineError::Launch {
            program: command.program.clone(),
            source,
        })?;
        // Declared after `child` so it drops first, including on cancellation
        let mut group = ProcessGroupGuard::new(child.id());

        let stdout_task = tokio::spawn(read_capped(child.stdout.take(), limit));
        let stderr_task = tokio::spawn(read_capped(child.stderr.take(), limit));
        let readers = [stdout_task.abort_handle(), stderr_task.abort_handle()];
        let abort_readers = || readers.iter().for_each(|handle| handle.abort());

        let status = match tokio::time::timeout(budget, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                abort_readers();
                return Err(EngineError::Execution {
                    exit_code: None,
                    stderr: format!("failed to wait for engine: {}", e),
                });
            }
            Err(_) => {
                group.kill();
                // kill() also reaps, so no zombie is left behind
                if let Err(e) = child.kill().await {
                    tracing::warn!(program = %command.program, error = %e, "Failed to kill timed-out engine");
                }
                abort_readers();
                tracing::warn!(
                    program = %command.program,
                    budget_ms = budget.as_millis() as u64,
                    "Analysis engine timed out"
                );
                return Err(EngineError::Timeout { budget });
            }
        };

        // A leftover engine helper may still hold the pipes open; it gets the rest of the budget
        let remaining = budget.saturating_sub(started.elapsed());
        let (stdout, stderr) = match tokio::time::timeout(remaining, async {
            (stdout_task.await, stderr_task.await)
        })
        .await
        {
            Ok((stdout, stderr)) => (stdout.unwrap_or_default(), stderr.unwrap_or_default()),
            Err(_) => {
                group.kill();
                abort_readers();
                tracing::warn!(
                    program = %command.program,
                    budget_ms = budget.as_millis() as u64,
                    "Analysis engine output still open at deadline"
                );
                return Err(EngineError::Timeout { budget });
            }
        };
        group.disarm();

        let duration = started.elapsed();
        tracing::debug!(
            program = %command.program,
            exit_code = ?status.code(),
            duration_ms = duration.as_millis() as u64,
            stdout_bytes = stdout.len(),
            "Analysis engine exited"
        );

        if !status.success() {
            return Err(EngineError::Execution {
                exit_code: status.code(),
                stderr: excerpt(&stderr),
            });
        }

        Ok(EngineInvocation {
            program: command.program.clone(),
            args: command.args.clone(),
            stdout,
            stderr,
            exit_code: status.code(),
            duration,
        })
    }
}

/// SIGKILLs the engine's process group on drop unless disarmed
///
/// `kill_on_drop` only reaches the direct child; anything it spawned lives
/// in the same group and goes with it here.
struct ProcessGroupGuard {
    #[cfg(unix)]
    pgid: Option<nix::unistd::Pid>,
    armed: bool,
}

impl ProcessGroupGuard {
    fn new(child_pid: Option<u32>) -> Self {
        #[cfg(not(unix))]
        let _ = child_pid;
        Self {
            #[cfg(unix)]
            pgid: child_pid
                .and_then(|pid| i32::try_from(pid).ok())
                .map(nix::unistd::Pid::from_raw),
            armed: true,
        }
    }

    /// Engine finished cleanly; leave the group alone
    fn disarm(&mut self) {
        self.armed = false;
    }

    #[cfg(unix)]
    fn kill(&mut self) {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};

        self.armed = false;
        let Some(pgid) = self.pgid else {
            return;
        };
        match killpg(pgid, Signal::SIGKILL) {
            Ok(()) => tracing::debug!(pgid = pgid.as_raw(), "Engine process group killed"),
            Err(Errno::ESRCH) => {}
            Err(e) => tracing::warn!(pgid = pgid.as_raw(), error = %e, "Failed to kill engine process group"),
        }
    }

    #[cfg(not(unix))]
    fn kill(&mut self) {
        self.armed = false;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        if self.armed {
            self.kill();
        }
    }
}

/// Read a pipe to the end, keeping at most `limit` bytes
///
/// Bytes past the limit are drained and dropped so the child never blocks
/// on a full pipe.
async fn read_capped<R>(reader: Option<R>, limit: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return String::new();
    };

    let mut kept = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let room = limit.saturating_sub(kept.len());
                kept.extend_from_slice(&chunk[..n.min(room)]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!(error = %e, "Failed reading engine output");
                break;
            }
        }
    }

    String::from_utf8_lossy(&kept).into_owned()
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= STDERR_EXCERPT_LEN {
        return trimmed.to_string();
    }
    let mut end = STDERR_EXCERPT_LEN;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}
