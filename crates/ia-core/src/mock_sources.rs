//! Mock capability sources for testing.
//!
//! Builders for registry snapshots, in-memory filesystem metadata and fixed
//! instrumentation rows, so inventory runs can be exercised on any platform.
//!
//! # Example
//!
//! ```ignore
//! use ia_core::mock_sources::{MockEntry, MockFileMetadata, MockRegistryBuilder};
//!
//! let registry = MockRegistryBuilder::new()
//!     .machine(MockEntry::new("{A1}", "Foo").install_date("20230615"))
//!     .user_wow(MockEntry::new("bar", "Bar").icon(r"C:\Bar\bar.exe,0"))
//!     .build();
//!
//! let files = MockFileMetadata::new().file(r"C:\Bar\bar.exe", ts(2021, 3, 4, 5, 6, 7));
//! ```

use crate::fsmeta::FileMetadata;
use crate::instrumentation::{InstrumentationRow, StaticInstrumentation};
use crate::registry::{RegistrySnapshot, SnapshotKey, SnapshotRegistry, SnapshotValue};
use chrono::{NaiveDate, NaiveDateTime};
use ia_common::{RegistryScope, RegistryView};
use std::collections::HashMap;

/// One registration entry under construction.
#[derive(Debug, Clone)]
pub struct MockEntry {
    key: SnapshotKey,
}

impl MockEntry {
    /// Entry with a key name and a display name.
    pub fn new(key_name: &str, display_name: &str) -> Self {
        Self::unnamed(key_name).string("DisplayName", display_name)
    }

    /// Entry without a display name.
    pub fn unnamed(key_name: &str) -> Self {
        Self {
            key: SnapshotKey::new(key_name),
        }
    }

    pub fn string(mut self, name: &str, value: &str) -> Self {
        self.key = self.key.with_value(name, SnapshotValue::String(value.to_string()));
        self
    }

    pub fn dword(mut self, name: &str, value: u32) -> Self {
        self.key = self.key.with_value(name, SnapshotValue::Dword(value));
        self
    }

    pub fn install_date(self, raw: &str) -> Self {
        self.string("InstallDate", raw)
    }

    pub fn icon(self, raw: &str) -> Self {
        self.string("DisplayIcon", raw)
    }

    pub fn location(self, path: &str) -> Self {
        self.string("InstallLocation", path)
    }

    pub fn publisher(self, publisher: &str) -> Self {
        self.string("Publisher", publisher)
    }

    pub fn version(self, version: &str) -> Self {
        self.string("DisplayVersion", version)
    }

    pub fn system_component(self) -> Self {
        self.dword("SystemComponent", 1)
    }

    pub fn no_display(self) -> Self {
        self.dword("NoDisplay", 1)
    }

    /// Make the entry unreadable.
    pub fn denied(mut self) -> Self {
        self.key = self.key.denied();
        self
    }
}

/// Builds a [`SnapshotRegistry`] one entry at a time.
#[derive(Debug, Clone, Default)]
pub struct MockRegistryBuilder {
    snapshot: RegistrySnapshot,
    denied_roots: Vec<(RegistryScope, RegistryView)>,
}

impl MockRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry under a root and view.
    pub fn entry(mut self, scope: RegistryScope, view: RegistryView, entry: MockEntry) -> Self {
        let root = self.root(scope, view);
        root.subkeys.push(entry.key);
        self
    }

    /// Native HKLM entry.
    pub fn machine(self, entry: MockEntry) -> Self {
        self.entry(RegistryScope::LocalMachine, RegistryView::Native, entry)
    }

    /// WOW6432Node HKLM entry.
    pub fn machine_wow(self, entry: MockEntry) -> Self {
        self.entry(RegistryScope::LocalMachine, RegistryView::Wow6432, entry)
    }

    /// Native HKCU entry.
    pub fn user(self, entry: MockEntry) -> Self {
        self.entry(RegistryScope::CurrentUser, RegistryView::Native, entry)
    }

    /// WOW6432Node HKCU entry.
    pub fn user_wow(self, entry: MockEntry) -> Self {
        self.entry(RegistryScope::CurrentUser, RegistryView::Wow6432, entry)
    }

    /// Make a whole root unreadable.
    pub fn deny_root(mut self, scope: RegistryScope, view: RegistryView) -> Self {
        self.root(scope, view);
        self.denied_roots.push((scope, view));
        self
    }

    pub fn build_snapshot(mut self) -> RegistrySnapshot {
        for (scope, view) in std::mem::take(&mut self.denied_roots) {
            self.root(scope, view).access_denied = true;
        }
        self.snapshot
    }

    pub fn build(self) -> SnapshotRegistry {
        SnapshotRegistry::new(self.build_snapshot())
    }

    fn root(&mut self, scope: RegistryScope, view: RegistryView) -> &mut SnapshotKey {
        let roots = self.snapshot.root_mut(scope);
        let path = view.uninstall_path();
        let idx = match roots.iter().position(|k| k.path == path) {
            Some(idx) => idx,
            None => {
                roots.push(SnapshotKey::new(path));
                roots.len() - 1
            }
        };
        &mut roots[idx]
    }
}

/// In-memory [`FileMetadata`].
#[derive(Debug, Clone, Default)]
pub struct MockFileMetadata {
    files: HashMap<String, NaiveDateTime>,
    dirs: HashMap<String, NaiveDateTime>,
}

impl MockFileMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, path: &str, created: NaiveDateTime) -> Self {
        self.files.insert(path.to_string(), created);
        self
    }

    pub fn dir(mut self, path: &str, created: NaiveDateTime) -> Self {
        self.dirs.insert(path.to_string(), created);
        self
    }
}

impl FileMetadata for MockFileMetadata {
    fn file_created(&self, path: &str) -> Option<NaiveDateTime> {
        self.files.get(path).copied()
    }

    fn dir_created(&self, path: &str) -> Option<NaiveDateTime> {
        self.dirs.get(path).copied()
    }
}

/// Instrumentation returning `(name, yyyyMMdd)` pairs.
pub fn instrumentation_rows(rows: &[(&str, &str)]) -> StaticInstrumentation {
    StaticInstrumentation::rows(
        rows.iter()
            .map(|(name, date)| InstrumentationRow::new(*name, *date))
            .collect(),
    )
}

/// Local timestamp shorthand. Panics on an invalid date.
pub fn ts(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, min, sec))
        .unwrap_or_else(|| panic!("invalid mock timestamp {year}-{month}-{day} {hour}:{min}:{sec}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryStore;

    #[test]
    fn test_builder_groups_entries_by_root() {
        let registry = MockRegistryBuilder::new()
            .machine(MockEntry::new("a", "A"))
            .machine(MockEntry::new("b", "B"))
            .machine_wow(MockEntry::new("c", "C"))
            .build();
        let machine = &registry.snapshot().local_machine;
        assert_eq!(machine.len(), 2);
        assert_eq!(machine[0].subkeys.len(), 2);
        assert!(registry.snapshot().current_user.is_empty());
    }

    #[test]
    fn test_deny_root() {
        let registry = MockRegistryBuilder::new()
            .deny_root(RegistryScope::CurrentUser, RegistryView::Native)
            .build();
        assert!(registry
            .open(RegistryScope::CurrentUser, RegistryView::Native.uninstall_path())
            .is_err());
    }

    #[test]
    fn test_mock_files() {
        let fs = MockFileMetadata::new()
            .file("a.exe", ts(2020, 1, 2, 3, 4, 5))
            .dir("dir", ts(2019, 1, 1, 0, 0, 0));
        assert!(fs.file_created("a.exe").is_some());
        assert!(fs.dir_created("a.exe").is_none());
        assert!(fs.dir_created("dir").is_some());
    }
}
