use std::io::ErrorKind;

use winreg::enums::{HKEY_CURRENT_USER, KEY_QUERY_VALUE};
use winreg::RegKey;

use super::{ProxySource, PROXY_ENABLE, PROXY_SERVER};
use crate::error::SourceError;

/// Per-user WinINet settings key.
pub const INTERNET_SETTINGS_KEY: &str =
    r"Software\Microsoft\Windows\CurrentVersion\Internet Settings";

/// The current user's WinINet proxy settings.
pub struct RegistrySource {
    key: RegKey,
}

impl RegistrySource {
    /// Open the settings key with query access. The handle is kept for the
    /// lifetime of the source.
    pub fn open() -> Result<Self, SourceError> {
        let key = RegKey::predef(HKEY_CURRENT_USER)
            .open_subkey_with_flags(INTERNET_SETTINGS_KEY, KEY_QUERY_VALUE)
            .map_err(location_err)?;
        Ok(Self { key })
    }
}

impl ProxySource for RegistrySource {
    fn read_enabled(&mut self) -> Result<u32, SourceError> {
        match self.key.get_value::<u32, _>(PROXY_ENABLE) {
            Ok(value) => Ok(value),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(SourceError::Missing { name: PROXY_ENABLE })
            }
            Err(err) => Err(location_err(err)),
        }
    }

    fn read_server(&mut self) -> Result<Option<String>, SourceError> {
        match self.key.get_value::<String, _>(PROXY_SERVER) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(location_err(err)),
        }
    }
}

fn location_err(source: std::io::Error) -> SourceError {
    SourceError::Io {
        location: format!(r"HKCU\{INTERNET_SETTINGS_KEY}"),
        source,
    }
}
