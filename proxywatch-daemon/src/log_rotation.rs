//! Size-based rotation of the proxy change log.
//!
//! `proxy-monitor.log` → `proxy-monitor.log.1` → … → `proxy-monitor.log.<keep>`;
//! the oldest copy is dropped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use proxywatch_core::Config;

/// When to rotate and how many rotated copies to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    pub max_bytes: u64,
    pub keep: usize,
}

impl RotationPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_bytes: config.log_max_bytes,
            keep: config.log_keep,
        }
    }

    /// Rotate `log_path` once it has reached `max_bytes`.
    ///
    /// Returns `true` if a rotation happened. A missing log is not an error.
    pub fn rotate_if_needed(&self, log_path: &Path) -> io::Result<bool> {
        let size = match fs::metadata(log_path) {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err),
        };
        if size < self.max_bytes || self.keep == 0 {
            return Ok(false);
        }

        remove_if_exists(&numbered_path(log_path, self.keep))?;
        for n in (1..self.keep).rev() {
            rename_if_exists(&numbered_path(log_path, n), &numbered_path(log_path, n + 1))?;
        }
        fs::rename(log_path, numbered_path(log_path, 1))?;

        // The proxy log reopens per line, so an empty file here is only for
        // readers tailing the path.
        fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(log_path)?;
        Ok(true)
    }
}

/// Rotate `log_path` under `policy`, logging the result. Never fails.
pub fn rotate_proxy_log(log_path: &Path, policy: RotationPolicy) {
    match policy.rotate_if_needed(log_path) {
        Ok(true) => tracing::info!(path = %log_path.display(), "proxy log rotated"),
        Ok(false) => {}
        Err(err) => {
            tracing::warn!(path = %log_path.display(), error = %err, "proxy log rotation failed")
        }
    }
}

/// `<base>.<n>`, e.g. `proxy-monitor.log.2`.
fn numbered_path(base: &Path, n: usize) -> PathBuf {
    let mut name = base.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{n}"));
    base.with_file_name(name)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

fn rename_if_exists(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}
