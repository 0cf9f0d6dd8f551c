//! Error types for proxywatch-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the command codec and configuration loading.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `config.yaml` exists but is not valid YAML for [`crate::Config`].
    #[error("failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `config.yaml` parsed but holds a value the monitor cannot run with.
    #[error("invalid config at {path}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },

    /// A request byte that maps to no command.
    #[error("unknown command byte {0}")]
    UnknownCommandByte(u8),

    /// A response byte other than 0 or 1.
    #[error("unknown response byte {0}")]
    UnknownResponseByte(u8),

    /// [`crate::Command::None`] has no wire value.
    #[error("the empty command cannot be sent to the monitor")]
    NoneOnWire,
}

/// Errors reading the watched proxy settings.
#[derive(Debug, Error)]
pub enum SourceError {
    /// A required value is not present in the store.
    #[error("proxy setting {name} is not set")]
    Missing { name: &'static str },

    /// The store could not be opened or read.
    #[error("failed to read proxy settings from {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    /// A file-backed store holds malformed YAML.
    #[error("failed to parse proxy settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The configured source kind does not exist on this platform.
    #[error("{0} proxy source is not available on this platform")]
    Unsupported(&'static str),
}

/// Convenience constructor for [`CoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}
