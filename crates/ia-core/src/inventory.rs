//! Inventory run orchestration.
//!
//! One call enumerates every visible package, builds the instrumentation
//! cache once, resolves every record, and returns the records in discovery
//! order with run metadata. Nothing is persisted between calls.

use crate::collect::{enumerate_installed_apps, EnumerationMetadata, EnumerationOptions};
use crate::fsmeta::{FileMetadata, PathNormalizer};
use crate::instrumentation::{CacheStatus, InstallDateCache, InstrumentationSource};
use crate::logging::{event_names, LogContext, Stage};
use crate::registry::RegistryStore;
use crate::resolve::{InstallDateResolver, ResolutionSummary};
use ia_common::{InstalledApp, RegistryScope};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// The external capabilities an inventory run reads from.
#[derive(Clone, Copy)]
pub struct InventorySources<'a> {
    pub registry: &'a dyn RegistryStore,
    pub instrumentation: &'a dyn InstrumentationSource,
    pub files: &'a dyn FileMetadata,
    pub normalizer: &'a dyn PathNormalizer,
}

/// Options for one inventory run.
#[derive(Debug, Clone)]
pub struct InventoryOptions {
    /// Registry roots to enumerate, in order.
    pub scopes: Vec<RegistryScope>,
}

impl Default for InventoryOptions {
    fn default() -> Self {
        Self {
            scopes: RegistryScope::ALL.to_vec(),
        }
    }
}

/// Result of an inventory run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Inventory {
    /// Records in discovery order.
    pub apps: Vec<InstalledApp>,

    pub metadata: InventoryMetadata,
}

impl Inventory {
    /// Records no tier could date.
    pub fn unresolved(&self) -> impl Iterator<Item = &InstalledApp> {
        self.apps.iter().filter(|a| !a.is_resolved())
    }
}

/// Metadata about an inventory run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InventoryMetadata {
    /// Platform identifier.
    pub platform: String,

    /// Registry source ("windows", "snapshot:<path>").
    pub registry_source: String,

    /// Instrumentation source ("cim:powershell.exe", "disabled", ...).
    pub instrumentation_source: String,

    /// Timestamp when the run started (RFC 3339).
    pub started_at: String,

    pub duration_ms: u64,

    /// Number of records returned.
    pub app_count: usize,

    pub enumeration: EnumerationMetadata,

    pub cache: CacheStatus,

    /// Names held by the cache after filtering.
    pub cache_entries: usize,

    pub resolution: ResolutionSummary,

    /// Warnings from every stage.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Run a complete inventory.
pub fn collect_inventory(
    sources: InventorySources<'_>,
    options: &InventoryOptions,
    ctx: &LogContext,
) -> Inventory {
    let start = Instant::now();
    let started_at = chrono::Utc::now().to_rfc3339();
    let registry_source = sources.registry.describe();
    let instrumentation_source = sources.instrumentation.describe();

    crate::log_event!(
        ctx,
        INFO,
        event_names::INVENTORY_STARTED,
        Stage::Init,
        "inventory started",
        registry = registry_source.as_str(),
        instrumentation = instrumentation_source.as_str()
    );

    let enumeration = enumerate_installed_apps(
        sources.registry,
        sources.normalizer,
        &EnumerationOptions {
            scopes: options.scopes.clone(),
        },
        ctx,
    );
    crate::log_event!(
        ctx,
        INFO,
        event_names::ENUM_FINISHED,
        Stage::Enumerate,
        "enumeration finished",
        apps = enumeration.apps.len(),
        roots_visited = enumeration.metadata.roots_visited.len(),
        skipped_hidden = enumeration.metadata.skipped_hidden,
        warnings = enumeration.metadata.warnings.len()
    );

    let cache = InstallDateCache::build(sources.instrumentation);
    match cache.status() {
        CacheStatus::Loaded { rows } => crate::log_event!(
            ctx,
            INFO,
            event_names::CACHE_BUILT,
            Stage::Cache,
            "instrumentation cache built",
            rows = *rows,
            entries = cache.len()
        ),
        CacheStatus::Degraded { reason } => crate::log_event!(
            ctx,
            WARN,
            event_names::CACHE_DEGRADED,
            Stage::Cache,
            "instrumentation unavailable, continuing with filesystem fallbacks",
            reason = reason.as_str()
        ),
        CacheStatus::Disabled => crate::log_event!(
            ctx,
            DEBUG,
            event_names::CACHE_DISABLED,
            Stage::Cache,
            "instrumentation disabled"
        ),
    }

    let mut apps = enumeration.apps;
    let resolution = InstallDateResolver::new(&cache, sources.files).resolve_all(&mut apps);
    crate::log_event!(
        ctx,
        INFO,
        event_names::RESOLVE_FINISHED,
        Stage::Resolve,
        "install dates resolved",
        registry = resolution.registry,
        instrumentation = resolution.instrumentation,
        icon_file = resolution.icon_file,
        install_location = resolution.install_location,
        unresolved = resolution.unresolved
    );

    let mut warnings = enumeration.metadata.warnings.clone();
    if let CacheStatus::Degraded { reason } = cache.status() {
        warnings.push(format!("instrumentation: {}", reason));
    }

    let duration = start.elapsed();
    crate::log_event!(
        ctx,
        DEBUG,
        event_names::INVENTORY_FINISHED,
        Stage::Resolve,
        "inventory finished",
        duration_ms = duration.as_millis() as u64
    );

    Inventory {
        metadata: InventoryMetadata {
            platform: std::env::consts::OS.to_string(),
            registry_source,
            instrumentation_source,
            started_at,
            duration_ms: duration.as_millis() as u64,
            app_count: apps.len(),
            enumeration: enumeration.metadata,
            cache: cache.status().clone(),
            cache_entries: cache.len(),
            resolution,
            warnings,
        },
        apps,
    }
}
