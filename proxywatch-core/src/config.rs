//! `config.yaml` — optional runtime settings.
//!
//! Every field has a default; a missing file means "all defaults".
//!
//! ```yaml
//! poll_interval_ms: 1000
//! source:
//!   kind: file
//!   path: /home/me/.proxywatch/proxy-settings.yaml
//! log_max_bytes: 10485760
//! log_keep: 5
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError, SourceError};
use crate::source::{FileSource, ProxySource};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_LOG_MAX_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_LOG_KEEP: usize = 5;

/// File name of the default file-backed proxy store, under the runtime root.
pub const DEFAULT_SETTINGS_FILE: &str = "proxy-settings.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Delay between two polls of the proxy settings.
    pub poll_interval_ms: u64,
    pub source: SourceConfig,
    /// Proxy log size that triggers rotation.
    pub log_max_bytes: u64,
    /// Rotated proxy log copies to keep.
    pub log_keep: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            source: SourceConfig::default(),
            log_max_bytes: DEFAULT_LOG_MAX_BYTES,
            log_keep: DEFAULT_LOG_KEEP,
        }
    }
}

/// Where proxy settings are read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// The current user's WinINet registry key (Windows only).
    Registry,
    /// A YAML file with `ProxyEnable` / `ProxyServer` keys. Defaults to
    /// [`DEFAULT_SETTINGS_FILE`] under the runtime root.
    File {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },
}

impl Default for SourceConfig {
    fn default() -> Self {
        if cfg!(windows) {
            SourceConfig::Registry
        } else {
            SourceConfig::File { path: None }
        }
    }
}

impl SourceConfig {
    /// Open the configured source. `root` resolves the default file path.
    ///
    /// The default file is created with the proxy marked disabled on first
    /// use; an explicitly configured path must already exist.
    pub fn open(&self, root: &Path) -> Result<Box<dyn ProxySource>, SourceError> {
        match self {
            SourceConfig::File { path: Some(path) } => {
                Ok(Box::new(FileSource::new(path.clone())))
            }
            SourceConfig::File { path: None } => {
                let source = FileSource::new(root.join(DEFAULT_SETTINGS_FILE));
                if source.create_if_missing()? {
                    tracing::info!(
                        path = %source.path().display(),
                        "created default proxy settings file"
                    );
                }
                Ok(Box::new(source))
            }
            SourceConfig::Registry => open_registry(),
        }
    }
}

#[cfg(windows)]
fn open_registry() -> Result<Box<dyn ProxySource>, SourceError> {
    Ok(Box::new(crate::source::RegistrySource::open()?))
}

#[cfg(not(windows))]
fn open_registry() -> Result<Box<dyn ProxySource>, SourceError> {
    Err(SourceError::Unsupported("registry"))
}

impl Config {
    /// Load `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(io_err(path, err)),
        };
        let config = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&content).map_err(|source| CoreError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?
        };
        config.validate(path)?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn validate(&self, path: &Path) -> Result<(), CoreError> {
        let invalid = |reason: &str| CoreError::InvalidConfig {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };
        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms must be greater than zero"));
        }
        if self.log_keep == 0 {
            return Err(invalid("log_keep must be at least 1"));
        }
        Ok(())
    }
}
