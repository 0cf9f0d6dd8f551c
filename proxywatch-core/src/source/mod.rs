//! Proxy settings sources.
//!
//! A source is a key-value store holding an integer "proxy enabled" value and
//! an optional "proxy server" string. It is only ever read.

mod file;
#[cfg(windows)]
mod registry;

pub use file::FileSource;
#[cfg(windows)]
pub use registry::RegistrySource;

use crate::error::SourceError;

/// Name of the enabled flag in every store.
pub const PROXY_ENABLE: &str = "ProxyEnable";
/// Name of the server address in every store.
pub const PROXY_SERVER: &str = "ProxyServer";

/// One point-in-time read of the watched settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxySnapshot {
    pub enabled: u32,
    pub server: String,
}

impl ProxySnapshot {
    pub fn new(enabled: u32, server: impl Into<String>) -> Self {
        Self {
            enabled,
            server: server.into(),
        }
    }
}

/// Read access to the watched settings.
pub trait ProxySource: Send {
    /// Read the enabled flag. Absence is an error.
    fn read_enabled(&mut self) -> Result<u32, SourceError>;

    /// Read the server address. `Ok(None)` when the value is not set.
    fn read_server(&mut self) -> Result<Option<String>, SourceError>;

    /// Read both values. A missing server address becomes the empty string.
    ///
    /// Stores that can hand out both values from one read override this so
    /// the pair is never torn by a concurrent write.
    fn read_snapshot(&mut self) -> Result<ProxySnapshot, SourceError> {
        let enabled = self.read_enabled()?;
        let server = self.read_server()?.unwrap_or_default();
        Ok(ProxySnapshot { enabled, server })
    }
}

impl<S: ProxySource + ?Sized> ProxySource for Box<S> {
    fn read_enabled(&mut self) -> Result<u32, SourceError> {
        (**self).read_enabled()
    }

    fn read_server(&mut self) -> Result<Option<String>, SourceError> {
        (**self).read_server()
    }

    fn read_snapshot(&mut self) -> Result<ProxySnapshot, SourceError> {
        (**self).read_snapshot()
    }
}
