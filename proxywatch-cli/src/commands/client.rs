//! Client path — forward one command to the running monitor.
//!
//! Always exits successfully: outcomes and failures are printed, not signalled
//! through the exit status.

use proxywatch_core::Command;
use proxywatch_daemon::{send_command, ClientConfig, DaemonError};

pub fn run(client: &ClientConfig, command: Command) {
    match send_command(&client.endpoint, command) {
        Ok(reply) => println!("{}", reply.message(command)),
        Err(err @ DaemonError::ServerNotRunning { .. }) => {
            println!("Failed to connect to the proxy monitor: {err}");
        }
        Err(err) => println!("Failed to send {} command: {err}", command.or_start()),
    }
}
