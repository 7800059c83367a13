//! Deadline-bounded subprocess execution.
//!
//! Every blocking point of a strategy goes through one [`Deadline`]. Processes
//! are spawned as their own process group so that a timeout kills the shell
//! and everything it started, not just the direct child.

use std::{future::Future, process::ExitStatus, time::Duration};

use command_group::{AsyncCommandGroup, AsyncGroupChild};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    time::Instant,
};

use crate::{CommandParts, Completed, ExecutionError};

/// Per-stream capture limit (1 MiB). Anything beyond is drained and dropped.
const MAX_STREAM_BYTES: u64 = 1024 * 1024;

const TRUNCATION_NOTE: &str = "\n... (output truncated)\n";

/// Wall-clock bound shared by every blocking point of one execution.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// A deadline `budget` from now.
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    /// The full budget this deadline was created with.
    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    /// Time left before expiry, zero once expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Run a future to completion or until the deadline.
    ///
    /// The future is dropped on expiry.
    ///
    /// # Errors
    /// Returns `ExecutionError::Timeout` if the deadline passes first.
    pub async fn bound<F: Future>(&self, fut: F) -> Result<F::Output, ExecutionError> {
        tokio::time::timeout_at(self.at, fut)
            .await
            .map_err(|_| ExecutionError::Timeout)
    }
}

/// Exit status and captured streams of a finished process.
#[derive(Debug)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CapturedOutput {
    /// Stdout followed by stderr, lossily decoded.
    #[must_use]
    pub fn combined(&self) -> String {
        let mut output = String::from_utf8_lossy(&self.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&self.stderr));
        output
    }

    /// Classify by exit status: zero succeeds, anything else is a failure.
    #[must_use]
    pub fn into_completed(self) -> Completed {
        let output = self.combined();
        match self.status.code() {
            Some(0) => Completed::success(output),
            Some(code) => Completed::failure(output, ExecutionError::NonZeroExit(code)),
            None => Completed::failure(output, ExecutionError::Terminated),
        }
    }
}

/// Kills the process group on drop unless disarmed.
///
/// Covers the paths where the execution future itself is dropped, such as a
/// caller that disconnects mid-run.
struct GroupGuard {
    child: AsyncGroupChild,
    armed: bool,
}

impl GroupGuard {
    const fn new(child: AsyncGroupChild) -> Self {
        Self { child, armed: true }
    }

    const fn disarm(&mut self) {
        self.armed = false;
    }

    async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::warn!("Failed to kill process group: {e}");
        }
        self.armed = false;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.child.start_kill() {
                tracing::debug!("Failed to kill dropped process group: {e}");
            }
        }
    }
}

/// Spawn a command, capture its output and wait for it within the deadline.
///
/// On expiry the whole process group is killed and reaped before
/// `Timeout` is returned.
///
/// # Errors
/// Returns `Spawn` if the process cannot start, `Timeout` on expiry and
/// `Io` if waiting or reading fails.
pub async fn run_captured(
    parts: &CommandParts,
    deadline: &Deadline,
) -> Result<CapturedOutput, ExecutionError> {
    let mut cmd = parts.to_command();
    let child = cmd.group_spawn().map_err(|source| ExecutionError::Spawn {
        program: parts.program.clone(),
        source,
    })?;
    let mut guard = GroupGuard::new(child);

    let stdout = guard.child.inner().stdout.take();
    let stderr = guard.child.inner().stderr.take();

    let child = &mut guard.child;
    let collected = deadline
        .bound(async move {
            let (status, stdout, stderr) =
                tokio::join!(child.wait(), read_pipe(stdout), read_pipe(stderr));
            Ok::<_, std::io::Error>(CapturedOutput {
                status: status?,
                stdout: stdout?,
                stderr: stderr?,
            })
        })
        .await;

    match collected {
        Ok(Ok(output)) => {
            guard.disarm();
            Ok(output)
        }
        Ok(Err(e)) => Err(e.into()),
        Err(timeout) => {
            tracing::warn!(
                program = %parts.program,
                budget_ms = deadline.budget().as_millis(),
                "Process exceeded its deadline, killing process group"
            );
            guard.kill().await;
            Err(timeout)
        }
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let Some(pipe) = pipe else {
        return Ok(Vec::new());
    };

    let mut buf = Vec::new();
    let mut limited = pipe.take(MAX_STREAM_BYTES);
    limited.read_to_end(&mut buf).await?;

    let mut rest = limited.into_inner();
    let dropped = tokio::io::copy(&mut rest, &mut tokio::io::sink()).await?;
    if dropped > 0 {
        buf.extend_from_slice(TRUNCATION_NOTE.as_bytes());
    }
    Ok(buf)
}
