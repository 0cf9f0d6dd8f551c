//! Append-only proxy change log (`logs/proxy-monitor.log`).
//!
//! The file is reopened for every line so a rotation between two writes is
//! picked up without coordination.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use proxywatch_core::ProxyChange;

use crate::error::{io_err, DaemonError};

#[derive(Debug, Clone)]
pub struct ProxyLog {
    path: PathBuf,
}

impl ProxyLog {
    /// Create the log file (and its directory) if missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DaemonError> {
        let log = Self { path: path.into() };
        if let Some(dir) = log.path.parent() {
            fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        log.open_append()?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line for `change` observed at `at`.
    pub fn append<Tz>(&self, change: &ProxyChange, at: &DateTime<Tz>) -> Result<(), DaemonError>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let mut file = self.open_append()?;
        writeln!(file, "{}", change.log_line(at)).map_err(|e| io_err(&self.path, e))
    }

    fn open_append(&self) -> Result<fs::File, DaemonError> {
        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }
        options.open(&self.path).map_err(|e| io_err(&self.path, e))
    }
}
