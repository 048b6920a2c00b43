//! Package registration enumeration.
//!
//! Walks the uninstall registrations under each root and view:
//!
//! | Root | Sub-path |
//! |------|----------|
//! | HKCU | `SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall` |
//! | HKCU | `SOFTWARE\WOW6432Node\Microsoft\Windows\CurrentVersion\Uninstall` |
//! | HKLM | (same two) |
//!
//! Entries without a display name, and entries flagged `SystemComponent=1`
//! or `NoDisplay=1`, are not user-visible packages and are skipped. Records
//! come back in discovery order and are never deduplicated.

use super::types::{Enumeration, EnumerationMetadata, EnumerationOptions};
use crate::fsmeta::PathNormalizer;
use crate::logging::{event_names, LogContext, Stage};
use crate::registry::{RegistryKey, RegistryStore};
use ia_common::{parse_install_date, InstalledApp, RegistryScope, RegistryView};
use tracing::{debug, span, trace, Level};

/// Registration value names.
mod value_names {
    pub const DISPLAY_NAME: &str = "DisplayName";
    pub const DISPLAY_VERSION: &str = "DisplayVersion";
    pub const PUBLISHER: &str = "Publisher";
    pub const INSTALL_LOCATION: &str = "InstallLocation";
    pub const DISPLAY_ICON: &str = "DisplayIcon";
    pub const INSTALL_DATE: &str = "InstallDate";
    pub const SYSTEM_COMPONENT: &str = "SystemComponent";
    pub const NO_DISPLAY: &str = "NoDisplay";
}

/// Why an entry produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    Unnamed,
    Hidden,
}

/// Enumerate all visible installed packages.
///
/// Missing roots contribute nothing. Roots that exist but cannot be read are
/// skipped and reported in [`EnumerationMetadata::warnings`].
pub fn enumerate_installed_apps(
    store: &dyn RegistryStore,
    normalizer: &dyn PathNormalizer,
    options: &EnumerationOptions,
    ctx: &LogContext,
) -> Enumeration {
    let _span = span!(Level::DEBUG, "enumerate", store = %store.describe()).entered();

    let mut apps = Vec::new();
    let mut metadata = EnumerationMetadata::default();

    for &scope in &options.scopes {
        for view in RegistryView::ALL {
            walk_root(store, normalizer, scope, view, ctx, &mut apps, &mut metadata);
        }
    }

    debug!(
        apps = apps.len(),
        entries_seen = metadata.entries_seen,
        skipped_hidden = metadata.skipped_hidden,
        skipped_unnamed = metadata.skipped_unnamed,
        skipped_unreadable = metadata.skipped_unreadable,
        "enumeration complete"
    );

    Enumeration { apps, metadata }
}

fn walk_root(
    store: &dyn RegistryStore,
    normalizer: &dyn PathNormalizer,
    scope: RegistryScope,
    view: RegistryView,
    ctx: &LogContext,
    apps: &mut Vec<InstalledApp>,
    metadata: &mut EnumerationMetadata,
) {
    let label = format!(r"{}\{}", scope.hive_name(), view.uninstall_path());

    let root = match store.open(scope, view.uninstall_path()) {
        Ok(Some(root)) => root,
        Ok(None) => {
            crate::log_event!(
                ctx,
                DEBUG,
                event_names::ENUM_ROOT_MISSING,
                Stage::Enumerate,
                "registration root absent",
                root = label.as_str()
            );
            metadata.roots_missing.push(label);
            return;
        }
        Err(e) => {
            root_failed(ctx, &label, &e.to_string(), "cannot open registration root, skipping");
            metadata.warnings.push(format!("{}: {}", label, e));
            return;
        }
    };

    let names = match root.subkey_names() {
        Ok(names) => names,
        Err(e) => {
            root_failed(ctx, &label, &e.to_string(), "cannot list registration root, skipping");
            metadata.warnings.push(format!("{}: {}", label, e));
            return;
        }
    };
    metadata.roots_visited.push(label);

    for name in names {
        metadata.entries_seen += 1;
        let entry = match root.open_subkey(&name) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                // Uninstalled between listing and opening
                trace!(key = %name, "registration vanished");
                metadata.skipped_unreadable += 1;
                continue;
            }
            Err(e) => {
                debug!(key = %name, error = %e, "registration unreadable");
                metadata.skipped_unreadable += 1;
                metadata.warnings.push(e.to_string());
                continue;
            }
        };

        match read_entry(entry.as_ref(), &name, normalizer, scope, view) {
            Ok(app) => apps.push(app),
            Err(Skip::Unnamed) => metadata.skipped_unnamed += 1,
            Err(Skip::Hidden) => metadata.skipped_hidden += 1,
        }
    }
}

fn root_failed(ctx: &LogContext, label: &str, error: &str, msg: &str) {
    crate::log_event!(
        ctx,
        WARN,
        event_names::ENUM_ROOT_FAILED,
        Stage::Enumerate,
        msg,
        root = label,
        error = error
    );
}

/// Build a record from one registration entry.
fn read_entry(
    entry: &dyn RegistryKey,
    key_name: &str,
    normalizer: &dyn PathNormalizer,
    scope: RegistryScope,
    view: RegistryView,
) -> Result<InstalledApp, Skip> {
    let name = entry
        .string_value(value_names::DISPLAY_NAME)
        .filter(|n| !n.trim().is_empty())
        .ok_or(Skip::Unnamed)?;

    if is_flag_set(entry, value_names::SYSTEM_COMPONENT) || is_flag_set(entry, value_names::NO_DISPLAY) {
        trace!(key = %key_name, name = %name, "hidden registration");
        return Err(Skip::Hidden);
    }

    let mut app = InstalledApp::new(name, key_name, scope, view);
    app.version = entry.string_value(value_names::DISPLAY_VERSION);
    app.publisher = entry.string_value(value_names::PUBLISHER);
    app.install_location = entry.string_value(value_names::INSTALL_LOCATION);
    app.display_icon = entry
        .string_value(value_names::DISPLAY_ICON)
        .and_then(|raw| clean_icon_path(&raw))
        .map(|path| normalizer.normalize(&path));
    app.registry_install_date = entry
        .string_value(value_names::INSTALL_DATE)
        .and_then(|raw| parse_install_date(&raw));

    Ok(app)
}

/// Only an integer value of exactly 1 hides an entry.
fn is_flag_set(entry: &dyn RegistryKey, name: &str) -> bool {
    entry.dword_value(name) == Some(1)
}

/// Strip an `,iconIndex` suffix and surrounding quotes from a `DisplayIcon` value.
///
/// `"C:\Program Files\App\app.exe",0` becomes `C:\Program Files\App\app.exe`.
/// A value that is blank after cleaning yields `None`.
pub fn clean_icon_path(raw: &str) -> Option<String> {
    let before_comma = raw.split(',').next().unwrap_or(raw);
    let cleaned = before_comma.trim().trim_matches('"').trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}
