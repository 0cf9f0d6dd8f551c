//! Proxywatch — log every change of the system proxy setting.
//!
//! # Usage
//!
//! ```text
//! proxywatch            start monitoring (or tell the running monitor to start)
//! proxywatch -start     same as above
//! proxywatch -stop      pause monitoring
//! proxywatch -quit      stop the running monitor
//! ```
//!
//! The first invocation claims `~/.proxywatch/monitor.lock` and becomes the
//! long-lived monitor. Every later invocation forwards its command to that
//! monitor and exits.

mod commands;

use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Parser;

use proxywatch_core::Command;
use proxywatch_daemon::{claim_singleton, Role};

#[derive(Parser, Debug)]
#[command(
    name = "proxywatch",
    version,
    about = "Watch the system proxy setting and log every change",
    long_about = None,
)]
struct Cli {
    /// Command for the monitor: -start, -stop or -quit. Anything after the
    /// first argument is ignored.
    #[arg(value_name = "COMMAND", trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl Cli {
    /// The parsed command. Unrecognised input is reported and treated as absent.
    fn command(&self) -> Command {
        let Some(raw) = self.args.first() else {
            return Command::None;
        };
        match raw.parse::<CommandArg>() {
            Ok(arg) => arg.into(),
            Err(err) => {
                println!("Failed to parse command line arguments: {err}");
                Command::None
            }
        }
    }
}

/// Thin wrapper so `-start` style flags parse into [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandArg(pub Command);

impl FromStr for CommandArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let name = s
            .strip_prefix("--")
            .or_else(|| s.strip_prefix('-'))
            .ok_or_else(|| format!("unknown command: {s}"))?;
        match name {
            "start" => Ok(Self(Command::Start)),
            "stop" => Ok(Self(Command::Stop)),
            "quit" => Ok(Self(Command::Quit)),
            _ => Err(format!("unknown command: {s}")),
        }
    }
}

impl From<CommandArg> for Command {
    fn from(arg: CommandArg) -> Self {
        arg.0
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command();
    let home = dirs::home_dir().context("could not determine home directory")?;

    match claim_singleton(&home).context("failed to claim the monitor lock")? {
        Role::Server(server) => commands::server::run(server, command),
        Role::Client(client) => {
            commands::client::run(&client, command);
            Ok(())
        }
    }
}
