//! JSON registry snapshots.
//!
//! A snapshot captures the part of the registry enumeration reads, so an
//! inventory can be audited offline or on a non-Windows host:
//!
//! ```json
//! {
//!   "local_machine": [
//!     {
//!       "path": "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Uninstall",
//!       "subkeys": [
//!         { "path": "{1A2B}", "values": { "DisplayName": "Foo", "NoDisplay": 0 } }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Top-level keys carry a full sub-path under their root; nested keys carry a
//! single name. Key and value names match case-insensitively, like the live
//! registry. Child order is preserved as written.

use super::{RegValue, RegistryError, RegistryKey, RegistryStore};
use ia_common::RegistryScope;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A snapshot value: JSON numbers are DWORDs, JSON strings are strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotValue {
    Dword(u32),
    String(String),
}

impl From<&SnapshotValue> for RegValue {
    fn from(value: &SnapshotValue) -> Self {
        match value {
            SnapshotValue::Dword(v) => RegValue::Dword(*v),
            SnapshotValue::String(s) => RegValue::String(s.clone()),
        }
    }
}

/// One key of a snapshot tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotKey {
    /// Full sub-path for root entries, key name for nested entries.
    pub path: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, SnapshotValue>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subkeys: Vec<SnapshotKey>,

    /// Simulates an ACL that denies read access to this key.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub access_denied: bool,
}

impl SnapshotKey {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Add a value.
    pub fn with_value(mut self, name: impl Into<String>, value: SnapshotValue) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Add a child key.
    pub fn with_subkey(mut self, key: SnapshotKey) -> Self {
        self.subkeys.push(key);
        self
    }

    /// Mark this key unreadable.
    pub fn denied(mut self) -> Self {
        self.access_denied = true;
        self
    }
}

/// Both roots of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub current_user: Vec<SnapshotKey>,

    #[serde(default)]
    pub local_machine: Vec<SnapshotKey>,
}

impl RegistrySnapshot {
    fn root(&self, scope: RegistryScope) -> &[SnapshotKey] {
        match scope {
            RegistryScope::CurrentUser => &self.current_user,
            RegistryScope::LocalMachine => &self.local_machine,
        }
    }

    /// Mutable access to a root, for building snapshots in code.
    pub fn root_mut(&mut self, scope: RegistryScope) -> &mut Vec<SnapshotKey> {
        match scope {
            RegistryScope::CurrentUser => &mut self.current_user,
            RegistryScope::LocalMachine => &mut self.local_machine,
        }
    }
}

/// [`RegistryStore`] over an in-memory [`RegistrySnapshot`].
#[derive(Debug, Clone, Default)]
pub struct SnapshotRegistry {
    snapshot: RegistrySnapshot,
    source: Option<PathBuf>,
}

impl SnapshotRegistry {
    pub fn new(snapshot: RegistrySnapshot) -> Self {
        Self {
            snapshot,
            source: None,
        }
    }

    /// Parse a snapshot from JSON text.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(raw)?))
    }

    /// Load a snapshot file.
    pub fn from_path(path: &Path) -> ia_common::Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| ia_common::Error::SnapshotInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut registry =
            Self::from_json(&raw).map_err(|e| ia_common::Error::SnapshotInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        registry.source = Some(path.to_path_buf());
        Ok(registry)
    }

    pub fn snapshot(&self) -> &RegistrySnapshot {
        &self.snapshot
    }
}

impl RegistryStore for SnapshotRegistry {
    fn describe(&self) -> String {
        match &self.source {
            Some(path) => format!("snapshot:{}", path.display()),
            None => "snapshot".to_string(),
        }
    }

    fn open(
        &self,
        scope: RegistryScope,
        path: &str,
    ) -> Result<Option<Box<dyn RegistryKey + '_>>, RegistryError> {
        let wanted = normalize_key_path(path);
        let found = self
            .snapshot
            .root(scope)
            .iter()
            .find(|key| normalize_key_path(&key.path).eq_ignore_ascii_case(&wanted));

        let full_path = format!(r"{}\{}", scope.hive_name(), wanted);
        open_node(found, full_path)
    }
}

fn open_node(
    node: Option<&SnapshotKey>,
    full_path: String,
) -> Result<Option<Box<dyn RegistryKey + '_>>, RegistryError> {
    match node {
        None => Ok(None),
        Some(key) if key.access_denied => Err(RegistryError::AccessDenied { path: full_path }),
        Some(key) => Ok(Some(Box::new(SnapshotKeyRef {
            key,
            path: full_path,
        }))),
    }
}

fn normalize_key_path(path: &str) -> String {
    path.trim_matches('\\').replace('/', "\\")
}

struct SnapshotKeyRef<'a> {
    key: &'a SnapshotKey,
    path: String,
}

impl RegistryKey for SnapshotKeyRef<'_> {
    fn path(&self) -> &str {
        &self.path
    }

    fn subkey_names(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self.key.subkeys.iter().map(|k| k.path.clone()).collect())
    }

    fn open_subkey(&self, name: &str) -> Result<Option<Box<dyn RegistryKey + '_>>, RegistryError> {
        let found = self
            .key
            .subkeys
            .iter()
            .find(|k| k.path.eq_ignore_ascii_case(name));
        open_node(found, format!(r"{}\{}", self.path, name))
    }

    fn value(&self, name: &str) -> Option<RegValue> {
        self.key
            .values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| RegValue::from(v))
    }
}
