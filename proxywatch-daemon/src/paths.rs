use std::path::{Path, PathBuf};

pub const RUNTIME_DIR: &str = ".proxywatch";
pub const LOCK_FILE: &str = "monitor.lock";
pub const CONFIG_FILE: &str = "config.yaml";
pub const PROXY_LOG: &str = "proxy-monitor.log";

#[cfg(unix)]
pub const SOCKET_FILE: &str = "proxywatch.sock";

#[cfg(windows)]
pub const PIPE_NAME: &str = r"\\.\pipe\proxymonitor";

pub fn runtime_root(home: &Path) -> PathBuf {
    home.join(RUNTIME_DIR)
}

pub fn lock_path(home: &Path) -> PathBuf {
    runtime_root(home).join(LOCK_FILE)
}

pub fn config_path(home: &Path) -> PathBuf {
    runtime_root(home).join(CONFIG_FILE)
}

pub fn logs_dir(home: &Path) -> PathBuf {
    runtime_root(home).join("logs")
}

pub fn proxy_log_path(home: &Path) -> PathBuf {
    logs_dir(home).join(PROXY_LOG)
}

/// The well-known command endpoint: a Unix socket under the runtime root.
#[cfg(unix)]
pub fn endpoint(home: &Path) -> PathBuf {
    runtime_root(home).join(SOCKET_FILE)
}

/// The well-known command endpoint: a named pipe shared by the session.
#[cfg(windows)]
pub fn endpoint(_home: &Path) -> PathBuf {
    PathBuf::from(PIPE_NAME)
}
