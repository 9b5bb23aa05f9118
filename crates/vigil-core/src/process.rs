//! # Subprocess Orchestration
//!
//! All external tools are invoked through [`run_command`], which applies a
//! timeout, honors a cancellation token, and always returns a uniform
//! {stdout, stderr, exit code, elapsed} shape. Cancellation terminates the
//! child with SIGTERM first and escalates to SIGKILL after a short grace
//! window.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::{VigilError, VigilResult};

/// Grace window between SIGTERM and SIGKILL.
pub const KILL_GRACE: Duration = Duration::from_millis(500);

/// After a kill, orphaned grandchildren may keep the pipes open; bound the
/// drain so a killed tool can never stall the pipeline.
const PIPE_DRAIN: Duration = Duration::from_secs(1);

/// Captured output of one external tool invocation.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub elapsed_ms: u64,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Exit codes 0 and 1 both count as a completed run for diagnostic
    /// tools: 1 is the normal "issues were found" exit.
    pub fn completed_with_diagnostics(&self) -> bool {
        !self.timed_out && matches!(self.exit_code, Some(0) | Some(1))
    }
}

/// Spawn `argv` and wait for it, bounded by `timeout` and `cancel`.
///
/// A timeout is not an error at this level: the output comes back with
/// `timed_out = true` and whatever the pipes held. Cancellation is an error
/// because partial results must be discarded.
pub async fn run_command(
    argv: &[String],
    cwd: Option<&Path>,
    timeout: Duration,
    cancel: &CancellationToken,
) -> VigilResult<ProcessOutput> {
    let (program, args) = argv.split_first().ok_or_else(|| VigilError::SpawnFailed {
        command: String::new(),
        reason: "empty argv".to_string(),
    })?;

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let started = Instant::now();
    let mut child = command.spawn().map_err(|e| VigilError::SpawnFailed {
        command: argv.join(" "),
        reason: e.to_string(),
    })?;

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(pipe) = stdout_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(pipe) = stderr_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });

    enum WaitOutcome {
        Exited(std::io::Result<std::process::ExitStatus>),
        TimedOut,
        Cancelled,
    }

    let outcome = tokio::select! {
        status = child.wait() => WaitOutcome::Exited(status),
        _ = tokio::time::sleep(timeout) => WaitOutcome::TimedOut,
        _ = cancel.cancelled() => WaitOutcome::Cancelled,
    };

    let mut timed_out = false;
    let status = match outcome {
        WaitOutcome::Exited(status) => Some(status?),
        WaitOutcome::TimedOut => {
            debug!("command timed out after {:?}: {}", timeout, argv.join(" "));
            timed_out = true;
            terminate(&mut child).await;
            None
        }
        WaitOutcome::Cancelled => {
            terminate(&mut child).await;
            return Err(VigilError::Cancelled);
        }
    };

    let (stdout_bytes, stderr_bytes) = if timed_out {
        let stdout = tokio::time::timeout(PIPE_DRAIN, stdout_task).await;
        let stderr = tokio::time::timeout(PIPE_DRAIN, stderr_task).await;
        (
            stdout.ok().and_then(Result::ok).unwrap_or_default(),
            stderr.ok().and_then(Result::ok).unwrap_or_default(),
        )
    } else {
        (
            stdout_task.await.unwrap_or_default(),
            stderr_task.await.unwrap_or_default(),
        )
    };

    Ok(ProcessOutput {
        stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
        stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
        exit_code: status.and_then(|s| s.code()),
        elapsed_ms: started.elapsed().as_millis() as u64,
        timed_out,
    })
}

/// SIGTERM, wait out the grace window, then SIGKILL.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as i32, libc::SIGTERM);
        }
        if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_ok() {
            return;
        }
    }

    if let Err(err) = child.start_kill() {
        debug!("failed to kill child process: {err}");
    }
    let _ = child.wait().await;
}

/// Resolve a binary on PATH without spawning a shell.
pub fn find_in_path(binary: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(binary);
        if candidate.is_file() {
            return Some(candidate);
        }
        #[cfg(windows)]
        for ext in ["exe", "cmd", "bat"] {
            let candidate = dir.join(format!("{binary}.{ext}"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}
