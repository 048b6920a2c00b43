//! Configuration store access.
//!
//! The enumerator reads package registrations through the [`RegistryStore`]
//! and [`RegistryKey`] traits so the same walk runs against:
//! - the live Windows registry ([`WindowsRegistry`], Windows only)
//! - an exported JSON snapshot ([`SnapshotRegistry`], any platform)
//!
//! A key that does not exist is `Ok(None)`, never an error. Errors are kept
//! for keys that exist but cannot be read (access denied, OS failures).

mod snapshot;
#[cfg(windows)]
mod windows;

pub use snapshot::{RegistrySnapshot, SnapshotKey, SnapshotRegistry, SnapshotValue};
#[cfg(windows)]
pub use windows::WindowsRegistry;

use ia_common::RegistryScope;
use thiserror::Error;

/// A typed registry value.
///
/// Only the two value kinds package registrations rely on are modelled.
/// Everything else reads as absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegValue {
    /// `REG_SZ` / `REG_EXPAND_SZ` (expanded).
    String(String),
    /// `REG_DWORD`.
    Dword(u32),
}

impl RegValue {
    /// String payload, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RegValue::String(s) => Some(s),
            RegValue::Dword(_) => None,
        }
    }

    /// Integer payload, if this is a DWORD value.
    pub fn as_dword(&self) -> Option<u32> {
        match self {
            RegValue::Dword(v) => Some(*v),
            RegValue::String(_) => None,
        }
    }
}

/// Errors reading an existing key.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("access denied: {path}")]
    AccessDenied { path: String },

    #[error("registry call failed for {path} (os error {code})")]
    Os { path: String, code: u32 },
}

impl RegistryError {
    /// Key path the error refers to.
    pub fn path(&self) -> &str {
        match self {
            RegistryError::AccessDenied { path } | RegistryError::Os { path, .. } => path,
        }
    }
}

/// An open key.
pub trait RegistryKey {
    /// Full path of this key, for diagnostics.
    fn path(&self) -> &str;

    /// Names of direct child keys, in store enumeration order.
    fn subkey_names(&self) -> Result<Vec<String>, RegistryError>;

    /// Open a direct child key. `Ok(None)` if it does not exist.
    fn open_subkey(&self, name: &str) -> Result<Option<Box<dyn RegistryKey + '_>>, RegistryError>;

    /// Read a named value. Missing and unsupported value kinds are `None`.
    fn value(&self, name: &str) -> Option<RegValue>;

    /// Read a string value.
    fn string_value(&self, name: &str) -> Option<String> {
        match self.value(name) {
            Some(RegValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Read a DWORD value.
    fn dword_value(&self, name: &str) -> Option<u32> {
        self.value(name).and_then(|v| v.as_dword())
    }
}

/// A hierarchical configuration store with two roots.
pub trait RegistryStore {
    /// Short description for logs ("windows", "snapshot:<path>").
    fn describe(&self) -> String;

    /// Open `path` under the root for `scope`. `Ok(None)` if it does not exist.
    fn open(
        &self,
        scope: RegistryScope,
        path: &str,
    ) -> Result<Option<Box<dyn RegistryKey + '_>>, RegistryError>;
}

/// Open the live registry of this machine.
#[cfg(windows)]
pub fn system_registry() -> ia_common::Result<Box<dyn RegistryStore>> {
    Ok(Box::new(WindowsRegistry::new()))
}

/// Open the live registry of this machine.
#[cfg(not(windows))]
pub fn system_registry() -> ia_common::Result<Box<dyn RegistryStore>> {
    Err(ia_common::Error::RegistryUnavailable(format!(
        "no live registry on {}",
        std::env::consts::OS
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reg_value_accessors() {
        let s = RegValue::String("Foo".into());
        let d = RegValue::Dword(1);
        assert_eq!(s.as_str(), Some("Foo"));
        assert_eq!(s.as_dword(), None);
        assert_eq!(d.as_dword(), Some(1));
        assert_eq!(d.as_str(), None);
    }

    #[test]
    fn test_registry_error_path() {
        let err = RegistryError::AccessDenied {
            path: r"HKLM\SOFTWARE".into(),
        };
        assert_eq!(err.path(), r"HKLM\SOFTWARE");
        assert!(err.to_string().contains("access denied"));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_system_registry_unavailable_off_windows() {
        let err = system_registry().err().unwrap();
        assert_eq!(err.code(), 20);
    }
}
