//! Change detection over proxy snapshots.
//!
//! [`ChangeMonitor`] caches the last *logged* observation, not the last raw
//! read: the cache moves only when a change is reported. The poll loop that
//! drives it lives in the daemon; [`ChangeMonitor::tick`] is one iteration of
//! that loop minus the sleep and the log write.

use std::fmt;

use chrono::{DateTime, TimeZone};

use crate::error::SourceError;
use crate::source::{ProxySnapshot, ProxySource};
use crate::state::MonitorState;

/// `Mon Jan  2 15:04:05 2006`
pub const TIMESTAMP_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// A detected transition, ready to be written to the proxy log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyChange {
    Off,
    /// Proxy enabled. The address may be empty.
    On { server: String },
}

impl ProxyChange {
    fn from_snapshot(snapshot: &ProxySnapshot) -> Self {
        if snapshot.enabled == 0 {
            ProxyChange::Off
        } else {
            ProxyChange::On {
                server: snapshot.server.clone(),
            }
        }
    }

    /// One proxy-log line, without the trailing newline.
    pub fn log_line<Tz>(&self, at: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        format!("{}\t{}", at.format(TIMESTAMP_FORMAT), self)
    }
}

impl fmt::Display for ProxyChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyChange::Off => f.write_str("proxy off"),
            ProxyChange::On { server } => write!(f, "proxy on, {server}"),
        }
    }
}

/// Last-logged-observation cache.
#[derive(Debug, Default)]
pub struct ChangeMonitor {
    last: ProxySnapshot,
}

impl ChangeMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> &ProxySnapshot {
        &self.last
    }

    /// Compare `snapshot` to the cache. On a difference, adopt it and report
    /// the change.
    pub fn observe(&mut self, snapshot: ProxySnapshot) -> Option<ProxyChange> {
        if snapshot == self.last {
            return None;
        }
        let change = ProxyChange::from_snapshot(&snapshot);
        self.last = snapshot;
        Some(change)
    }

    /// One poll iteration. Skips the read entirely while disarmed.
    ///
    /// An error means the enabled flag could not be read and the loop must
    /// stop.
    pub fn tick<S>(
        &mut self,
        state: &MonitorState,
        source: &mut S,
    ) -> Result<Option<ProxyChange>, SourceError>
    where
        S: ProxySource + ?Sized,
    {
        if !state.is_armed() {
            return Ok(None);
        }
        let snapshot = source.read_snapshot()?;
        Ok(self.observe(snapshot))
    }
}
