//! Producer data channel
//!
//! Framed documents leave the producer on the descriptor announced by the
//! `JSON_STREAM_FD` environment variable. When run outside a supervisor the
//! variable is absent and frames fall back to stdout, which makes the
//! producer usable standalone for debugging.

use crate::domain::{Result, StrataError};
use crate::extractor::process::JSON_STREAM_FD_ENV;
use std::os::fd::{FromRawFd, OwnedFd};
use tokio::io::AsyncWriteExt;
use tokio::net::unix::pipe;

/// Where frames are written
pub enum DataChannel {
    Pipe(pipe::Sender),
    Stdout(tokio::io::Stdout),
}

impl DataChannel {
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let written = match self {
            DataChannel::Pipe(sender) => sender.write_all(bytes).await,
            DataChannel::Stdout(stdout) => stdout.write_all(bytes).await,
        };
        written.map_err(|e| StrataError::Io(format!("Failed to write data frame: {e}")))
    }

    pub async fn flush(&mut self) -> Result<()> {
        let flushed = match self {
            DataChannel::Pipe(sender) => sender.flush().await,
            DataChannel::Stdout(stdout) => stdout.flush().await,
        };
        flushed.map_err(|e| StrataError::Io(format!("Failed to flush data channel: {e}")))
    }
}

/// Open the channel named by `JSON_STREAM_FD`, or fall back to stdout.
pub fn open_data_channel() -> Result<DataChannel> {
    match std::env::var(JSON_STREAM_FD_ENV) {
        Ok(raw) => {
            let fd: i32 = raw.parse().map_err(|_| {
                StrataError::Configuration(format!(
                    "{JSON_STREAM_FD_ENV} must be a descriptor number, got {raw:?}"
                ))
            })?;
            Ok(DataChannel::Pipe(sender_from_fd(fd)?))
        }
        Err(_) => {
            tracing::warn!("{JSON_STREAM_FD_ENV} is not set, writing data frames to stdout");
            Ok(DataChannel::Stdout(tokio::io::stdout()))
        }
    }
}

// Takes ownership of the descriptor and registers it with the runtime.
fn sender_from_fd(fd: i32) -> Result<pipe::Sender> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(StrataError::Process(format!(
                "Descriptor {fd} is not usable as a data channel: {}",
                std::io::Error::last_os_error()
            )));
        }
    }
    let owned = unsafe { OwnedFd::from_raw_fd(fd) };
    pipe::Sender::from_owned_fd(owned)
        .map_err(|e| StrataError::Process(format!("Failed to register data channel: {e}")))
}
