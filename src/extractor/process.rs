//! Producer process supervision
//!
//! The consumer spawns the producer as a child process with three
//! independently readable channels: stdout (informational log lines),
//! stderr (warnings and diagnostics) and a dedicated data pipe carrying
//! framed documents. The data pipe is created here and dup2'd onto a fixed
//! descriptor in the child; the descriptor number reaches the producer via
//! the `JSON_STREAM_FD` environment variable rather than a shared constant.
//!
//! The child's terminal outcome is exposed as a [`CompletionSignal`]: a
//! oneshot future resolved exactly once when the process exits, no matter
//! how many stream events fire around that moment. Exit code 0 resolves it
//! successfully; exit code 1 carries the captured stderr text as a
//! user-actionable failure; any other code is an internal failure.

use crate::domain::{Result, StrataError};
use std::os::fd::{FromRawFd, OwnedFd};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::unix::pipe;
use tokio::process::Command;
use tokio::sync::oneshot;

/// Descriptor number the data pipe occupies in the child.
pub const JSON_STREAM_FD: i32 = 3;

/// Name of the environment variable announcing the data descriptor.
pub const JSON_STREAM_FD_ENV: &str = "JSON_STREAM_FD";

/// How the child's stderr is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticMode {
    /// Forward each line as a warning immediately (extraction runs)
    Forward,
    /// Capture silently; the text surfaces only in a failure outcome.
    /// Used for connection probes, whose success path must emit exactly
    /// one machine-readable result and no noise.
    Quiet,
}

/// Terminal failure of the producer process
#[derive(Debug)]
pub struct ChildFailure {
    /// Raw exit code (-1 when the process was killed by a signal)
    pub exit_code: i32,
    /// Captured stderr text
    pub diagnostics: String,
}

impl ChildFailure {
    pub fn into_error(self) -> StrataError {
        if self.exit_code < 0 {
            return StrataError::Process(format!(
                "Producer process terminated by a signal. {}",
                self.diagnostics.trim()
            ));
        }
        StrataError::from_child_exit(self.exit_code, &self.diagnostics)
    }
}

/// Single-resolution future carrying the producer's terminal outcome
pub struct CompletionSignal {
    receiver: oneshot::Receiver<std::result::Result<(), ChildFailure>>,
}

impl CompletionSignal {
    /// Wait for the child to exit and classify the outcome.
    pub async fn wait(self) -> Result<()> {
        match self.receiver.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(failure)) => Err(failure.into_error()),
            Err(_) => Err(StrataError::Process(
                "Producer supervision task ended without reporting an outcome".to_string(),
            )),
        }
    }
}

/// A spawned producer: its data stream plus the completion signal
pub struct ProducerHandle {
    /// Read end of the framed-document pipe
    pub data: pipe::Receiver,
    /// Resolves exactly once on child exit
    pub completion: CompletionSignal,
}

/// Spawn a producer child process with log forwarding and a data pipe.
///
/// `command` must already carry its arguments and environment; this
/// function attaches the three channels, sets `JSON_STREAM_FD`, and wires
/// the supervision tasks onto the current runtime. The child is killed if
/// the handle is dropped before it exits, so an aborted run leaves no
/// orphan process behind.
pub fn spawn_producer(mut command: Command, mode: DiagnosticMode) -> Result<ProducerHandle> {
    let (data_rx, data_tx) = create_data_pipe()?;

    command
        .env(JSON_STREAM_FD_ENV, JSON_STREAM_FD.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let write_fd = data_tx.into_raw_fd();
    // Runs in the forked child before exec: move the pipe's write end onto
    // the agreed descriptor. dup2 clears CLOEXEC on the target.
    unsafe {
        command.pre_exec(move || {
            if libc::dup2(write_fd, JSON_STREAM_FD) < 0 {
                return Err(std::io::Error::last_os_error());
            }
            if write_fd != JSON_STREAM_FD {
                libc::close(write_fd);
            }
            Ok(())
        });
    }

    let spawned = command.spawn();

    // The parent's copy of the write end must be closed, otherwise the data
    // stream never reaches EOF.
    unsafe {
        libc::close(write_fd);
    }

    let mut child = spawned
        .map_err(|e| StrataError::Process(format!("Failed to spawn producer process: {e}")))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| StrataError::Process("Producer stdout was not captured".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| StrataError::Process("Producer stderr was not captured".to_string()))?;

    // Informational channel: forward as it arrives.
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if !line.trim().is_empty() {
                tracing::info!("{}", line.trim_end());
            }
        }
    });

    let (completion_tx, completion_rx) = oneshot::channel();

    tokio::spawn(async move {
        let diagnostics_task = async {
            let mut captured = String::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if mode == DiagnosticMode::Forward && !line.trim().is_empty() {
                    tracing::warn!("{}", line.trim_end());
                }
                captured.push_str(&line);
                captured.push('\n');
            }
            captured
        };

        let (status, diagnostics) = tokio::join!(child.wait(), diagnostics_task);

        let outcome = match status {
            Ok(status) if status.success() => {
                tracing::debug!("Producer process completed successfully");
                Ok(())
            }
            Ok(status) => Err(ChildFailure {
                exit_code: status.code().unwrap_or(-1),
                diagnostics,
            }),
            Err(e) => Err(ChildFailure {
                exit_code: -1,
                diagnostics: format!("Failed to await producer process: {e}"),
            }),
        };

        // The receiver may be gone if the pipeline already failed; that
        // outcome was reported through the pipeline error instead.
        let _ = completion_tx.send(outcome);
    });

    Ok(ProducerHandle {
        data: data_rx,
        completion: CompletionSignal {
            receiver: completion_rx,
        },
    })
}

// Anonymous pipe: nonblocking tokio receiver for the parent, a raw
// inheritable fd for the child.
fn create_data_pipe() -> Result<(pipe::Receiver, DataPipeFd)> {
    let mut fds = [0i32; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } < 0 {
        return Err(StrataError::Process(format!(
            "Failed to create data pipe: {}",
            std::io::Error::last_os_error()
        )));
    }
    let [read_fd, write_fd] = fds;

    // The read end stays on our side of every future exec.
    unsafe {
        libc::fcntl(read_fd, libc::F_SETFD, libc::FD_CLOEXEC);
        libc::fcntl(read_fd, libc::F_SETFL, libc::O_NONBLOCK);
    }

    let owned = unsafe { OwnedFd::from_raw_fd(read_fd) };
    let receiver = pipe::Receiver::from_owned_fd(owned)
        .map_err(|e| StrataError::Process(format!("Failed to register data pipe: {e}")))?;

    Ok((receiver, DataPipeFd(write_fd)))
}

struct DataPipeFd(i32);

impl DataPipeFd {
    fn into_raw_fd(self) -> i32 {
        self.0
    }
}
