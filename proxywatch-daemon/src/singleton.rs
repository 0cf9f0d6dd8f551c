//! Role selection through an exclusive lock on `<home>/.proxywatch/monitor.lock`.
//!
//! The first process to lock the file becomes the server and keeps the lock
//! until it exits (the OS drops it even on a crash). Every later process sees
//! the lock as contended and becomes a client. Contention is the expected
//! signal, not an error, and a client never retries the claim.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{io_err, DaemonError};
use crate::paths::{endpoint, lock_path, runtime_root};

/// Startup path decided once per process.
#[derive(Debug)]
pub enum Role {
    Server(ServerConfig),
    Client(ClientConfig),
}

/// Everything the server path owns. Dropping it releases the singleton lock.
#[derive(Debug)]
pub struct ServerConfig {
    home: PathBuf,
    _lock: InstanceLock,
}

impl ServerConfig {
    pub fn home(&self) -> &Path {
        &self.home
    }
}

/// Everything the client path needs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: PathBuf,
}

#[derive(Debug)]
struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to release monitor lock");
        }
    }
}

/// Try to become the server for `home`.
pub fn claim_singleton(home: &Path) -> Result<Role, DaemonError> {
    let root = runtime_root(home);
    fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;

    let path = lock_path(home);
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(|e| io_err(&path, e))?;

    match file.try_lock_exclusive() {
        Ok(()) => {}
        Err(err) if is_contended(&err) => {
            tracing::debug!(path = %path.display(), "monitor lock held by another process");
            return Ok(Role::Client(ClientConfig {
                endpoint: endpoint(home),
            }));
        }
        Err(err) => return Err(io_err(&path, err)),
    }

    // Informational only; the lock is what matters.
    file.set_len(0).map_err(|e| io_err(&path, e))?;
    writeln!(file, "{}", std::process::id()).map_err(|e| io_err(&path, e))?;

    Ok(Role::Server(ServerConfig {
        home: home.to_path_buf(),
        _lock: InstanceLock { file, path },
    }))
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
