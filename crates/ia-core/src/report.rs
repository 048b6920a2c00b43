//! Rendering of inventory results for the CLI output formats.

use crate::config::ConfigSnapshot;
use crate::inventory::Inventory;
use ia_common::{InstalledApp, SCHEMA_VERSION};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Top-level JSON document for `--format json`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InventoryEnvelope {
    pub schema_version: String,
    pub run_id: String,
    /// RFC 3339 timestamp.
    pub generated_at: String,
    pub config: ConfigSnapshot,
    pub inventory: Inventory,
}

impl InventoryEnvelope {
    pub fn new(run_id: impl Into<String>, config: ConfigSnapshot, inventory: Inventory) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            run_id: run_id.into(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            config,
            inventory,
        }
    }
}

/// One JSON object per record, newline-separated.
pub fn render_jsonl(apps: &[InstalledApp]) -> serde_json::Result<String> {
    let mut out = String::new();
    for app in apps {
        out.push_str(&serde_json::to_string(app)?);
        out.push('\n');
    }
    Ok(out)
}

/// Markdown table of records with run statistics.
pub fn render_markdown(inventory: &Inventory, apps: &[InstalledApp]) -> String {
    let meta = &inventory.metadata;
    let mut out = String::new();

    let _ = writeln!(out, "# Installed Software");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} packages from {} in {}ms",
        meta.app_count, meta.registry_source, meta.duration_ms
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "| Name | Version | Publisher | Installed | Source | Scope |");
    let _ = writeln!(out, "|------|---------|-----------|-----------|--------|-------|");

    for app in apps {
        let (installed, source) = match app.resolved_install_date {
            Some(r) => (r.at.format("%Y-%m-%d %H:%M").to_string(), r.source.to_string()),
            None => ("-".to_string(), "-".to_string()),
        };
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {}/{} |",
            md_cell(&app.name),
            md_cell(app.version.as_deref().unwrap_or("")),
            md_cell(app.publisher.as_deref().unwrap_or("")),
            installed,
            source,
            app.scope.hive_name(),
            app.registry_view
        );
    }

    if !meta.warnings.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Warnings");
        let _ = writeln!(out);
        for warning in &meta.warnings {
            let _ = writeln!(out, "- {}", warning);
        }
    }

    out
}

/// One-line status.
pub fn render_summary(inventory: &Inventory) -> String {
    let r = &inventory.metadata.resolution;
    format!(
        "{} packages: {} registry, {} instrumentation, {} icon file, {} install location, {} unresolved ({}ms)",
        inventory.metadata.app_count,
        r.registry,
        r.instrumentation,
        r.icon_file,
        r.install_location,
        r.unresolved,
        inventory.metadata.duration_ms
    )
}

fn md_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::EnumerationMetadata;
    use crate::instrumentation::CacheStatus;
    use crate::inventory::InventoryMetadata;
    use crate::resolve::ResolutionSummary;
    use chrono::NaiveDate;
    use ia_common::{DateSource, RegistryScope, RegistryView, ResolvedInstallDate};

    fn inventory() -> Inventory {
        let mut dated = InstalledApp::new("Foo | Pro", "foo", RegistryScope::LocalMachine, RegistryView::Native);
        dated.version = Some("1.0".into());
        dated.resolved_install_date = Some(ResolvedInstallDate::new(
            NaiveDate::from_ymd_opt(2023, 6, 15).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            DateSource::Registry,
        ));
        let undated = InstalledApp::new("Bar", "bar", RegistryScope::CurrentUser, RegistryView::Wow6432);

        Inventory {
            apps: vec![dated, undated],
            metadata: InventoryMetadata {
                platform: "windows".into(),
                registry_source: "snapshot".into(),
                instrumentation_source: "disabled".into(),
                started_at: "2024-01-01T00:00:00Z".into(),
                duration_ms: 12,
                app_count: 2,
                enumeration: EnumerationMetadata::default(),
                cache: CacheStatus::Disabled,
                cache_entries: 0,
                resolution: ResolutionSummary {
                    registry: 1,
                    unresolved: 1,
                    ..Default::default()
                },
                warnings: vec!["HKCU\\X: access denied".into()],
            },
        }
    }

    #[test]
    fn test_markdown_table() {
        let inv = inventory();
        let md = render_markdown(&inv, &inv.apps);
        assert!(md.contains("| Foo \\| Pro | 1.0 |  | 2023-06-15 00:00 | registry | HKLM/native |"));
        assert!(md.contains("| Bar |  |  | - | - | HKCU/wow6432 |"));
        assert!(md.contains("## Warnings"));
    }

    #[test]
    fn test_summary_line() {
        let line = render_summary(&inventory());
        assert!(line.starts_with("2 packages: 1 registry"));
        assert!(line.contains("1 unresolved"));
    }

    #[test]
    fn test_jsonl_one_line_per_record() {
        let inv = inventory();
        let out = render_jsonl(&inv.apps).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["name"], "Foo | Pro");
    }

    #[test]
    fn test_envelope_fields() {
        let snapshot = ConfigSnapshot {
            settings_path: None,
            settings_hash: None,
            schema_version: "1.0.0".into(),
            config_dir: "/tmp/ia".into(),
        };
        let envelope = InventoryEnvelope::new("run-abc", snapshot, inventory());
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["schema_version"], SCHEMA_VERSION);
        assert_eq!(json["run_id"], "run-abc");
        assert_eq!(json["inventory"]["metadata"]["app_count"], 2);
    }
}
