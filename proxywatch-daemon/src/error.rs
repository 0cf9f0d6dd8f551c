use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the daemon runtime, the command channel, and the
/// singleton claim.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Core(#[from] proxywatch_core::CoreError),

    #[error("proxy source error: {0}")]
    Source(#[from] proxywatch_core::SourceError),

    #[error("monitor protocol error: {0}")]
    Protocol(String),

    #[error("proxy monitor is not running (no endpoint at {endpoint})")]
    ServerNotRunning { endpoint: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
