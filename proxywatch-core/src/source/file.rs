use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{ProxySnapshot, ProxySource, PROXY_ENABLE};
use crate::error::SourceError;

/// YAML layout of a file-backed store.
///
/// ```yaml
/// ProxyEnable: 1
/// ProxyServer: "10.0.0.1:8080"
/// ```
#[derive(Debug, Default, Deserialize)]
struct SettingsDocument {
    #[serde(rename = "ProxyEnable")]
    proxy_enable: Option<u32>,
    #[serde(rename = "ProxyServer")]
    proxy_server: Option<String>,
}

const DISABLED_STORE: &str = "ProxyEnable: 0\n";

/// Proxy settings kept in a YAML file, re-read on every call.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file with the proxy marked disabled unless it exists.
    ///
    /// Returns `true` when the file was created.
    pub fn create_if_missing(&self) -> Result<bool, SourceError> {
        let io = |source| SourceError::Io {
            location: self.path.display().to_string(),
            source,
        };
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(io)?;
        }
        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(err) => return Err(io(err)),
        };
        file.write_all(DISABLED_STORE.as_bytes()).map_err(io)?;
        Ok(true)
    }

    fn load(&self) -> Result<SettingsDocument, SourceError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            location: self.path.display().to_string(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(SettingsDocument::default());
        }
        serde_yaml::from_str(&content).map_err(|source| SourceError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

impl SettingsDocument {
    fn enabled(&self) -> Result<u32, SourceError> {
        self.proxy_enable
            .ok_or(SourceError::Missing { name: PROXY_ENABLE })
    }
}

impl ProxySource for FileSource {
    fn read_enabled(&mut self) -> Result<u32, SourceError> {
        self.load()?.enabled()
    }

    fn read_server(&mut self) -> Result<Option<String>, SourceError> {
        match self.load() {
            Ok(doc) => Ok(doc.proxy_server),
            // The file vanished between the two reads; same as the value being absent.
            Err(SourceError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn read_snapshot(&mut self) -> Result<ProxySnapshot, SourceError> {
        let doc = self.load()?;
        Ok(ProxySnapshot {
            enabled: doc.enabled()?,
            server: doc.proxy_server.unwrap_or_default(),
        })
    }
}
