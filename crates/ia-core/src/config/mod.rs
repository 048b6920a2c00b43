//! Configuration loading and validation for ia-core.
//!
//! This module handles:
//! - Loading settings.json
//! - Config resolution order (CLI > env > XDG > defaults)
//! - Schema version and semantic validation
//! - Config snapshots for run metadata

mod settings;

pub use settings::{InstrumentationSettings, Settings, ValidationError, DEFAULT_POWERSHELL};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// Environment variable naming the config directory.
pub const CONFIG_DIR_ENV: &str = "INSTALL_AUDIT_CONFIG";

/// Config directory name under the user config root.
const CONFIG_DIR_NAME: &str = "install_audit";

/// Settings file name inside the config directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("invalid JSON in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("semantic validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl From<ConfigError> for ia_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ValidationError(_) | ConfigError::VersionMismatch { .. } => {
                ia_common::Error::InvalidSettings(err.to_string())
            }
            other => ia_common::Error::Config(other.to_string()),
        }
    }
}

/// Resolved configuration with provenance information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub settings: Settings,
    /// Settings file used (None if using defaults).
    pub settings_path: Option<PathBuf>,
    /// SHA-256 of the settings file content (None if using defaults).
    pub settings_hash: Option<String>,
    /// The config directory used for resolution.
    pub config_dir: PathBuf,
}

impl ResolvedConfig {
    /// Built-in defaults, with no file behind them.
    pub fn defaults(config_dir: PathBuf) -> Self {
        Self {
            settings: Settings::default(),
            settings_path: None,
            settings_hash: None,
            config_dir,
        }
    }

    /// Provenance summary for run metadata and `config show`.
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            settings_path: self.settings_path.clone(),
            settings_hash: self.settings_hash.clone(),
            schema_version: self.settings.schema_version.clone(),
            config_dir: self.config_dir.clone(),
        }
    }
}

/// Config provenance for output envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConfigSnapshot {
    pub settings_path: Option<PathBuf>,
    pub settings_hash: Option<String>,
    pub schema_version: String,
    pub config_dir: PathBuf,
}

/// Configuration resolution options.
#[derive(Debug, Default, Clone)]
pub struct ConfigOptions {
    /// Explicit config directory (highest priority).
    pub config_dir: Option<PathBuf>,
    /// Explicit settings file path.
    pub settings_path: Option<PathBuf>,
}

/// Load configuration with the standard resolution order.
///
/// Resolution order (highest to lowest priority):
/// 1. Explicit CLI flags (via ConfigOptions)
/// 2. Environment variable (INSTALL_AUDIT_CONFIG)
/// 3. XDG config home or the platform config dir (`install_audit/`)
/// 4. Built-in defaults
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    let config_dir = resolve_config_dir(options);

    if let Some(path) = &options.settings_path {
        let (settings, hash) = load_settings_file(path)?;
        return Ok(ResolvedConfig {
            settings,
            settings_path: Some(path.clone()),
            settings_hash: Some(hash),
            config_dir,
        });
    }

    let default_path = config_dir.join(SETTINGS_FILE);
    if default_path.exists() {
        let (settings, hash) = load_settings_file(&default_path)?;
        return Ok(ResolvedConfig {
            settings,
            settings_path: Some(default_path),
            settings_hash: Some(hash),
            config_dir,
        });
    }

    Ok(ResolvedConfig::defaults(config_dir))
}

/// Resolve the config directory using the standard resolution order.
fn resolve_config_dir(options: &ConfigOptions) -> PathBuf {
    if let Some(dir) = &options.config_dir {
        return dir.clone();
    }

    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    let config_root = std::env::var("XDG_CONFIG_HOME")
        .ok()
        .filter(|d| !d.trim().is_empty())
        .map(PathBuf::from)
        .or_else(dirs::config_dir)
        .unwrap_or_else(|| PathBuf::from("."));

    config_root.join(CONFIG_DIR_NAME)
}

/// Load, version-check and validate one settings file.
///
/// Returns the settings together with the SHA-256 of the raw content.
pub fn load_settings_file(path: &Path) -> Result<(Settings, String), ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::IoError {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let hash = sha256_hex(content.as_bytes());

    let settings: Settings =
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

    if settings.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(ConfigError::VersionMismatch {
            expected: CONFIG_SCHEMA_VERSION.to_string(),
            actual: settings.schema_version.clone(),
        });
    }

    settings.validate()?;
    Ok((settings, hash))
}

/// Lowercase hex SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options_for(dir: &Path) -> ConfigOptions {
        ConfigOptions {
            config_dir: Some(dir.to_path_buf()),
            settings_path: None,
        }
    }

    #[test]
    fn test_defaults_when_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&options_for(dir.path())).unwrap();
        assert_eq!(config.settings, Settings::default());
        assert!(config.settings_path.is_none());
        assert!(config.settings_hash.is_none());
        assert_eq!(config.config_dir, dir.path());
    }

    #[test]
    fn test_file_in_config_dir_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let raw = r#"{"schema_version":"1.0.0","scopes":["local_machine"]}"#;
        std::fs::write(dir.path().join(SETTINGS_FILE), raw).unwrap();

        let config = load_config(&options_for(dir.path())).unwrap();
        assert_eq!(config.settings.scopes, vec![ia_common::RegistryScope::LocalMachine]);
        assert_eq!(config.settings_hash.as_deref(), Some(sha256_hex(raw.as_bytes()).as_str()));
    }

    #[test]
    fn test_explicit_path_beats_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "{ broken").unwrap();
        let explicit = dir.path().join("other.json");
        std::fs::write(&explicit, r#"{"schema_version":"1.0.0"}"#).unwrap();

        let options = ConfigOptions {
            config_dir: Some(dir.path().to_path_buf()),
            settings_path: Some(explicit.clone()),
        };
        let config = load_config(&options).unwrap();
        assert_eq!(config.settings_path, Some(explicit));
    }

    #[test]
    fn test_version_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, r#"{"schema_version":"0.9.0"}"#).unwrap();
        match load_settings_file(&path) {
            Err(ConfigError::VersionMismatch { actual, .. }) => assert_eq!(actual, "0.9.0"),
            other => panic!("expected version mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_semantic_validation_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, r#"{"schema_version":"1.0.0","scopes":[]}"#).unwrap();
        let err = load_settings_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ValidationError::NoScopes)));
        let common: ia_common::Error = err.into();
        assert_eq!(common.code(), 11);
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(load_settings_file(&missing), Err(ConfigError::NotFound { .. })));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "[1, 2").unwrap();
        let err = load_settings_file(&bad).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        let common: ia_common::Error = err.into();
        assert_eq!(common.code(), 10);
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_snapshot_serializes() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&options_for(dir.path())).unwrap();
        let json = serde_json::to_value(config.snapshot()).unwrap();
        assert_eq!(json["schema_version"], CONFIG_SCHEMA_VERSION);
        assert!(json["settings_path"].is_null());
    }
}
