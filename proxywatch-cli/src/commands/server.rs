//! Server path — this process holds the monitor lock.

use anyhow::{Context, Result};

use proxywatch_core::Command;
use proxywatch_daemon::{start_blocking, ServerConfig};

pub fn run(server: ServerConfig, command: Command) -> Result<()> {
    start_blocking(server, command).context("proxy monitor exited with error")
}
