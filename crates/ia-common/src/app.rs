//! Installed package records.
//!
//! An [`InstalledApp`] is produced by enumeration and later receives exactly
//! one write: its [`ResolvedInstallDate`], chosen by the install-date resolver.

use chrono::{NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration-store root a package registration was found under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RegistryScope {
    /// Per-user registrations (`HKEY_CURRENT_USER`).
    CurrentUser,
    /// Machine-wide registrations (`HKEY_LOCAL_MACHINE`).
    LocalMachine,
}

impl RegistryScope {
    /// Both scopes in enumeration order.
    pub const ALL: [RegistryScope; 2] = [RegistryScope::CurrentUser, RegistryScope::LocalMachine];

    /// Conventional short hive name.
    pub fn hive_name(&self) -> &'static str {
        match self {
            RegistryScope::CurrentUser => "HKCU",
            RegistryScope::LocalMachine => "HKLM",
        }
    }
}

impl fmt::Display for RegistryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryScope::CurrentUser => write!(f, "current_user"),
            RegistryScope::LocalMachine => write!(f, "local_machine"),
        }
    }
}

impl std::str::FromStr for RegistryScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "current_user" | "user" | "hkcu" => Ok(RegistryScope::CurrentUser),
            "local_machine" | "machine" | "hklm" => Ok(RegistryScope::LocalMachine),
            _ => Err(format!("unknown registry scope: {}", s)),
        }
    }
}

/// Which of the two package-registration sub-paths a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RegistryView {
    /// Native registrations.
    Native,
    /// 32-bit registrations redirected under `WOW6432Node`.
    Wow6432,
}

impl RegistryView {
    /// Both views in enumeration order.
    pub const ALL: [RegistryView; 2] = [RegistryView::Native, RegistryView::Wow6432];

    /// Uninstall-registration sub-path for this view.
    pub fn uninstall_path(&self) -> &'static str {
        match self {
            RegistryView::Native => r"SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall",
            RegistryView::Wow6432 => {
                r"SOFTWARE\WOW6432Node\Microsoft\Windows\CurrentVersion\Uninstall"
            }
        }
    }
}

impl fmt::Display for RegistryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryView::Native => write!(f, "native"),
            RegistryView::Wow6432 => write!(f, "wow6432"),
        }
    }
}

/// The fallback tier that produced a resolved install date.
///
/// Variants are declared in priority order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum DateSource {
    /// `InstallDate` value of the registration entry.
    Registry,
    /// Install date reported by the instrumentation service.
    Instrumentation,
    /// Creation time of the display icon file.
    IconFile,
    /// Creation time of the install location directory.
    InstallLocation,
}

impl DateSource {
    /// All tiers in resolution order.
    pub const ALL: [DateSource; 4] = [
        DateSource::Registry,
        DateSource::Instrumentation,
        DateSource::IconFile,
        DateSource::InstallLocation,
    ];
}

impl fmt::Display for DateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DateSource::Registry => "registry",
            DateSource::Instrumentation => "instrumentation",
            DateSource::IconFile => "icon_file",
            DateSource::InstallLocation => "install_location",
        };
        write!(f, "{}", s)
    }
}

/// A resolved install timestamp together with the tier that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResolvedInstallDate {
    /// Local timestamp. Explicit tiers resolve to midnight of the recorded day.
    pub at: NaiveDateTime,
    /// Tier that produced the value.
    pub source: DateSource,
}

impl ResolvedInstallDate {
    pub fn new(at: NaiveDateTime, source: DateSource) -> Self {
        Self { at, source }
    }

    /// Calendar day of the resolved timestamp.
    pub fn date(&self) -> NaiveDate {
        self.at.date()
    }
}

/// One visible registered package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InstalledApp {
    // === Identity ===
    /// Display name. Never blank; the join key for instrumentation lookups.
    pub name: String,

    /// Registration key name (often a product code GUID).
    pub key_name: String,

    // === Metadata ===
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_location: Option<String>,

    /// Icon path with any `,index` suffix and quotes removed, in long form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_icon: Option<String>,

    // === Dates ===
    /// Parsed registry `InstallDate`, if present and well-formed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_install_date: Option<NaiveDate>,

    /// Final answer of the fallback chain. Absent when no tier succeeded.
    pub resolved_install_date: Option<ResolvedInstallDate>,

    // === Provenance ===
    pub scope: RegistryScope,
    pub registry_view: RegistryView,
}

impl InstalledApp {
    /// Create a record with only identity and provenance set.
    pub fn new(
        name: impl Into<String>,
        key_name: impl Into<String>,
        scope: RegistryScope,
        registry_view: RegistryView,
    ) -> Self {
        Self {
            name: name.into(),
            key_name: key_name.into(),
            publisher: None,
            version: None,
            install_location: None,
            display_icon: None,
            registry_install_date: None,
            resolved_install_date: None,
            scope,
            registry_view,
        }
    }

    /// Whether any tier produced a date for this record.
    pub fn is_resolved(&self) -> bool {
        self.resolved_install_date.is_some()
    }

    /// Tier that produced the resolved date, if any.
    pub fn date_source(&self) -> Option<DateSource> {
        self.resolved_install_date.map(|r| r.source)
    }
}
