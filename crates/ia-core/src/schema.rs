//! JSON Schema generation for output types.
//!
//! ```bash
//! # List available schema types
//! ia-core schema --list
//!
//! # Generate schema for a specific type
//! ia-core schema InstalledApp
//!
//! # Generate all schemas
//! ia-core schema --all
//! ```

use schemars::schema_for;
use serde_json::Value;
use std::collections::BTreeMap;

pub use crate::collect::EnumerationMetadata;
pub use crate::config::{ConfigSnapshot, Settings};
pub use crate::instrumentation::CacheStatus;
pub use crate::inventory::{Inventory, InventoryMetadata};
pub use crate::report::InventoryEnvelope;
pub use crate::resolve::ResolutionSummary;
pub use ia_common::{DateSource, InstalledApp, RegistryScope, RegistryView, ResolvedInstallDate};

/// Available schema types with their descriptions.
pub fn available_schemas() -> Vec<(&'static str, &'static str)> {
    vec![
        // Record types
        ("InstalledApp", "One visible registered package"),
        ("ResolvedInstallDate", "Install timestamp with the tier that produced it"),
        ("DateSource", "Install-date fallback tier"),
        ("RegistryScope", "Registry root (current_user, local_machine)"),
        ("RegistryView", "Registration sub-path (native, wow6432)"),
        // Run types
        ("EnumerationMetadata", "Statistics about registration enumeration"),
        ("CacheStatus", "How the instrumentation cache was populated"),
        ("ResolutionSummary", "Per-tier resolution tallies"),
        ("InventoryMetadata", "Metadata about an inventory run"),
        ("Inventory", "Records and run metadata"),
        ("InventoryEnvelope", "Top-level JSON output of `list`"),
        // Configuration
        ("Settings", "settings.json file"),
        ("ConfigSnapshot", "Configuration provenance"),
    ]
}

/// Generate JSON Schema for a type by name.
///
/// Returns None if the type is unknown.
pub fn generate_schema(type_name: &str) -> Option<Value> {
    let schema = match type_name {
        "InstalledApp" => schema_for!(InstalledApp),
        "ResolvedInstallDate" => schema_for!(ResolvedInstallDate),
        "DateSource" => schema_for!(DateSource),
        "RegistryScope" => schema_for!(RegistryScope),
        "RegistryView" => schema_for!(RegistryView),
        "EnumerationMetadata" => schema_for!(EnumerationMetadata),
        "CacheStatus" => schema_for!(CacheStatus),
        "ResolutionSummary" => schema_for!(ResolutionSummary),
        "InventoryMetadata" => schema_for!(InventoryMetadata),
        "Inventory" => schema_for!(Inventory),
        "InventoryEnvelope" => schema_for!(InventoryEnvelope),
        "Settings" => schema_for!(Settings),
        "ConfigSnapshot" => schema_for!(ConfigSnapshot),
        _ => return None,
    };

    serde_json::to_value(schema).ok()
}

/// Generate all schemas as a map from type name to schema.
pub fn generate_all_schemas() -> BTreeMap<String, Value> {
    available_schemas()
        .into_iter()
        .filter_map(|(name, _)| generate_schema(name).map(|s| (name.to_string(), s)))
        .collect()
}

/// Schema output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormat {
    /// Pretty-printed JSON (default)
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

/// Format a schema value for output.
pub fn format_schema(schema: &Value, format: SchemaFormat) -> String {
    let rendered = match format {
        SchemaFormat::Json => serde_json::to_string_pretty(schema),
        SchemaFormat::JsonCompact => serde_json::to_string(schema),
    };
    rendered.unwrap_or_else(|_| "null".to_string())
}
