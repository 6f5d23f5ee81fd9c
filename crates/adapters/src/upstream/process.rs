// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! External process execution with an enforced timeout.
//!
//! Every dependency install, benchmark run and source fetch goes through
//! [`run_command`]. On unix each command leads its own process group; when
//! it outlives its timeout, or the caller drops the future, the whole group
//! is killed, so tools that fork workers (`npm` starting `node`) stop with
//! it. A timed out process is reported as [`ProcessError::Timeout`] once it
//! has been reaped.

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Maximum number of stderr bytes kept in error messages.
const STDERR_TAIL_BYTES: usize = 4096;

/// Errors raised while running an external command.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The command line was empty.
    #[error("Empty command line")]
    EmptyCommand,

    /// The process could not be started.
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        /// Program name.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Waiting for the process failed.
    #[error("Failed waiting for '{program}': {source}")]
    Wait {
        /// Program name.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The process ran longer than allowed and was killed.
    #[error("'{program}' timed out after {timeout:?} and was killed")]
    Timeout {
        /// Program name.
        program: String,
        /// The enforced limit.
        timeout: Duration,
    },

    /// The process exited unsuccessfully.
    #[error("'{program}' exited with status {}: {stderr}", .code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    NonZeroExit {
        /// Program name.
        program: String,
        /// Exit code, `None` when terminated by a signal.
        code: Option<i32>,
        /// Tail of the captured stderr.
        stderr: String,
    },
}

/// Captured output of a successful command.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Raw stdout.
    pub stdout: Vec<u8>,
    /// Stderr, lossily decoded.
    pub stderr: String,
}

/// Run `argv` in `cwd`, killing it if it does not finish within `timeout`.
pub async fn run_command(
    argv: &[String],
    cwd: &Path,
    timeout: Duration,
) -> Result<ProcessOutput, ProcessError> {
    let (program, args) = argv.split_first().ok_or(ProcessError::EmptyCommand)?;
    debug!(program = %program, args = ?args, cwd = %cwd.display(), "Running external command");

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
        program: program.clone(),
        source,
    })?;
    let mut group = ProcessGroup::new(&child);

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let collected = tokio::time::timeout(timeout, async {
        let (status, stdout, stderr) =
            tokio::join!(child.wait(), read_pipe(stdout), read_pipe(stderr));
        Ok::<_, io::Error>((status?, stdout?, stderr?))
    })
    .await;

    let (status, stdout, stderr) = match collected {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err(ProcessError::Wait {
                program: program.clone(),
                source,
            })
        }
        Err(_) => {
            drop(group);
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to reap timed out process");
            }
            return Err(ProcessError::Timeout {
                program: program.clone(),
                timeout,
            });
        }
    };
    group.disarm();

    let stderr = String::from_utf8_lossy(&stderr).into_owned();
    if !status.success() {
        return Err(ProcessError::NonZeroExit {
            program: program.clone(),
            code: status.code(),
            stderr: tail(&stderr, STDERR_TAIL_BYTES).trim().to_string(),
        });
    }

    Ok(ProcessOutput { stdout, stderr })
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Kills the process group led by a child unless disarmed.
struct ProcessGroup {
    pgid: Option<i32>,
}

impl ProcessGroup {
    fn new(child: &Child) -> Self {
        let pgid = if cfg!(unix) {
            child.id().and_then(|pid| i32::try_from(pid).ok())
        } else {
            None
        };
        Self { pgid }
    }

    /// The leader exited on its own; leave the group alone.
    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid.take() {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
                debug!(pgid, error = %e, "Process group already gone");
            }
        }
    }
}

/// Render a command line for logs and error messages.
pub fn display_command(argv: &[String]) -> String {
    argv.join(" ")
}

fn tail(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
