//! Command vocabulary and its one-byte wire encoding.
//!
//! A client writes exactly one request byte; the server answers with exactly
//! one response byte for every command except [`Command::Quit`].
//!
//! ```text
//! request   1 = stop   2 = quit   3 = start
//! response  0 = no-op  1 = applied
//! ```
//!
//! Raw bytes are decoded here, at the boundary; the rest of the workspace only
//! handles [`Command`] values.

use std::fmt;

use crate::error::CoreError;

/// Reserved value for [`Command::None`]. Never valid on the wire.
pub const NONE_BYTE: u8 = 0;
pub const STOP_BYTE: u8 = 1;
pub const QUIT_BYTE: u8 = 2;
pub const START_BYTE: u8 = 3;

pub const RESPONSE_NOOP: u8 = 0;
pub const RESPONSE_APPLIED: u8 = 1;

/// A control command for the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Command {
    /// No command given on the command line.
    #[default]
    None,
    Start,
    Stop,
    Quit,
}

impl Command {
    /// Encode as the single request byte.
    pub fn to_wire(self) -> Result<u8, CoreError> {
        match self {
            Command::None => Err(CoreError::NoneOnWire),
            Command::Start => Ok(START_BYTE),
            Command::Stop => Ok(STOP_BYTE),
            Command::Quit => Ok(QUIT_BYTE),
        }
    }

    /// Decode a request byte. [`NONE_BYTE`] is rejected like any unknown value.
    pub fn from_wire(byte: u8) -> Result<Self, CoreError> {
        match byte {
            START_BYTE => Ok(Command::Start),
            STOP_BYTE => Ok(Command::Stop),
            QUIT_BYTE => Ok(Command::Quit),
            other => Err(CoreError::UnknownCommandByte(other)),
        }
    }

    /// "No command" means start, both for a fresh server and for a client.
    pub fn or_start(self) -> Self {
        match self {
            Command::None => Command::Start,
            other => other,
        }
    }

    /// Whether the server answers this command with a response byte.
    pub fn expects_response(self) -> bool {
        !matches!(self, Command::Quit)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Command::None => "none",
            Command::Start => "start",
            Command::Stop => "stop",
            Command::Quit => "quit",
        };
        f.write_str(s)
    }
}

/// Encode a command result as the response byte.
pub fn encode_response(applied: bool) -> u8 {
    if applied {
        RESPONSE_APPLIED
    } else {
        RESPONSE_NOOP
    }
}

/// Decode a response byte into "applied" (`true`) or "no-op" (`false`).
pub fn decode_response(byte: u8) -> Result<bool, CoreError> {
    match byte {
        RESPONSE_APPLIED => Ok(true),
        RESPONSE_NOOP => Ok(false),
        other => Err(CoreError::UnknownResponseByte(other)),
    }
}
