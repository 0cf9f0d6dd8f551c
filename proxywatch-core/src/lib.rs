//! Proxywatch core library — command codec, monitoring state, change detection.
//!
//! Public API surface:
//! - [`command`] — the command vocabulary and its one-byte wire encoding
//! - [`state`] — the shared armed flag and the [`Executor`] that mutates it
//! - [`source`] — proxy settings sources ([`ProxySource`]) and snapshots
//! - [`monitor`] — the [`ChangeMonitor`] state machine and log line layout
//! - [`config`] — `config.yaml` loading
//! - [`error`] — [`CoreError`], [`SourceError`]

pub mod command;
pub mod config;
pub mod error;
pub mod monitor;
pub mod source;
pub mod state;

pub use command::Command;
pub use config::{Config, SourceConfig};
pub use error::{CoreError, SourceError};
pub use monitor::{ChangeMonitor, ProxyChange};
pub use source::{FileSource, ProxySnapshot, ProxySource};
pub use state::{Executor, MonitorState, Outcome};
