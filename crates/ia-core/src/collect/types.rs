//! Types produced by package enumeration.

use ia_common::InstalledApp;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Options for [`enumerate_installed_apps`](super::enumerate_installed_apps).
#[derive(Debug, Clone)]
pub struct EnumerationOptions {
    /// Roots to walk, in order.
    pub scopes: Vec<ia_common::RegistryScope>,
}

impl Default for EnumerationOptions {
    fn default() -> Self {
        Self {
            scopes: ia_common::RegistryScope::ALL.to_vec(),
        }
    }
}

/// Result of walking the package registrations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enumeration {
    /// Visible packages in discovery order.
    pub apps: Vec<InstalledApp>,

    /// Walk statistics.
    pub metadata: EnumerationMetadata,
}

/// Statistics about one enumeration walk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EnumerationMetadata {
    /// Registration sub-paths that were opened (`HKLM\SOFTWARE\...`).
    pub roots_visited: Vec<String>,

    /// Registration sub-paths that do not exist on this machine.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roots_missing: Vec<String>,

    /// Child entries looked at.
    pub entries_seen: usize,

    /// Entries dropped for a missing or blank `DisplayName`.
    pub skipped_unnamed: usize,

    /// Entries dropped as `SystemComponent` or `NoDisplay`.
    pub skipped_hidden: usize,

    /// Entries that vanished or could not be opened.
    pub skipped_unreadable: usize,

    /// Roots or entries that failed to open, as human-readable messages.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}
