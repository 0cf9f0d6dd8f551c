//! Client side of the one-byte command channel.
//!
//! One connection per command: write the request byte, then (except for quit)
//! read the single response byte. No retries, no timeouts.

use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use proxywatch_core::command::decode_response;
use proxywatch_core::Command;

use crate::error::{io_err, DaemonError};

/// What the server reported for one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// The command changed the monitor state.
    Applied,
    /// The requested state already held.
    NoOp,
    /// Quit was written; the server never answers it.
    QuitSent,
}

impl Reply {
    /// User-facing text for `command` ending in this reply.
    pub fn message(self, command: Command) -> &'static str {
        match (command, self) {
            (Command::Quit, _) | (_, Reply::QuitSent) => "Quitting monitor program...",
            (Command::Stop, Reply::Applied) => "Stopped monitoring proxy settings.",
            (Command::Stop, Reply::NoOp) => "Proxy monitor is already turned off.",
            (Command::Start | Command::None, Reply::Applied) => "Started monitoring proxy settings.",
            (Command::Start | Command::None, Reply::NoOp) => "Already monitoring proxy settings.",
        }
    }
}

/// Send one command to the server at `endpoint`.
///
/// [`Command::None`] is sent as start.
pub fn send_command(endpoint: &Path, command: Command) -> Result<Reply, DaemonError> {
    let command = command.or_start();
    let request = command.to_wire()?;

    let mut stream = connect(endpoint)?;
    stream
        .write_all(&[request])
        .map_err(|e| io_err(endpoint, e))?;
    stream.flush().map_err(|e| io_err(endpoint, e))?;

    if !command.expects_response() {
        return Ok(Reply::QuitSent);
    }

    let mut response = [0u8; 1];
    match stream.read_exact(&mut response) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
            return Err(DaemonError::Protocol(
                "monitor closed connection before responding".to_string(),
            ));
        }
        Err(err) => return Err(io_err(endpoint, err)),
    }

    if decode_response(response[0])? {
        Ok(Reply::Applied)
    } else {
        Ok(Reply::NoOp)
    }
}

#[cfg(unix)]
fn connect(endpoint: &Path) -> Result<std::os::unix::net::UnixStream, DaemonError> {
    if !endpoint.exists() {
        return Err(DaemonError::ServerNotRunning {
            endpoint: endpoint.to_path_buf(),
        });
    }

    std::os::unix::net::UnixStream::connect(endpoint).map_err(|err| {
        if matches!(
            err.kind(),
            ErrorKind::NotFound | ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset
        ) {
            DaemonError::ServerNotRunning {
                endpoint: endpoint.to_path_buf(),
            }
        } else {
            io_err(endpoint, err)
        }
    })
}

#[cfg(windows)]
fn connect(endpoint: &Path) -> Result<std::fs::File, DaemonError> {
    std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(endpoint)
        .map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                DaemonError::ServerNotRunning {
                    endpoint: endpoint.to_path_buf(),
                }
            } else {
                io_err(endpoint, err)
            }
        })
}
