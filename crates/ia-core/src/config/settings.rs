//! Settings file model.
//!
//! ```json
//! {
//!   "schema_version": "1.0.0",
//!   "scopes": ["current_user", "local_machine"],
//!   "instrumentation": { "enabled": true, "timeout_secs": 120 }
//! }
//! ```
//!
//! Every field except `schema_version` may be omitted.

use crate::collect::{DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIMEOUT_SECS, MAX_TIMEOUT_SECS};
use ia_common::RegistryScope;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default PowerShell executable.
pub const DEFAULT_POWERSHELL: &str = "powershell.exe";

/// Semantic validation failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("scopes must name at least one registry root")]
    NoScopes,

    #[error("scope listed twice: {0}")]
    DuplicateScope(RegistryScope),

    #[error("instrumentation.timeout_secs must be greater than 0")]
    ZeroTimeout,

    #[error("instrumentation.timeout_secs must be at most 86400 (24h), got {0}")]
    TimeoutTooLarge(u64),

    #[error("instrumentation.max_output_bytes must be greater than 0")]
    ZeroOutputCap,

    #[error("instrumentation.powershell must not be blank")]
    BlankPowershell,
}

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Settings {
    pub schema_version: String,

    /// Registry roots to enumerate, in order.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<RegistryScope>,

    #[serde(default)]
    pub instrumentation: InstrumentationSettings,
}

/// Instrumentation query settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct InstrumentationSettings {
    /// Query the instrumentation service at all.
    pub enabled: bool,

    /// Kill the query after this many seconds.
    pub timeout_secs: u64,

    /// Cap on captured query output.
    pub max_output_bytes: usize,

    /// PowerShell executable name or path.
    pub powershell: String,
}

fn default_scopes() -> Vec<RegistryScope> {
    RegistryScope::ALL.to_vec()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: super::CONFIG_SCHEMA_VERSION.to_string(),
            scopes: default_scopes(),
            instrumentation: InstrumentationSettings::default(),
        }
    }
}

impl Default for InstrumentationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            powershell: DEFAULT_POWERSHELL.to_string(),
        }
    }
}

impl Settings {
    /// Check constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.scopes.is_empty() {
            return Err(ValidationError::NoScopes);
        }
        for (i, scope) in self.scopes.iter().enumerate() {
            if self.scopes[..i].contains(scope) {
                return Err(ValidationError::DuplicateScope(*scope));
            }
        }
        self.instrumentation.validate()
    }
}

impl InstrumentationSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout);
        }
        if self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(ValidationError::TimeoutTooLarge(self.timeout_secs));
        }
        if self.max_output_bytes == 0 {
            return Err(ValidationError::ZeroOutputCap);
        }
        if self.powershell.trim().is_empty() {
            return Err(ValidationError::BlankPowershell);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_minimal_file_fills_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"schema_version":"1.0.0"}"#).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_instrumentation_section() {
        let settings: Settings = serde_json::from_str(
            r#"{"schema_version":"1.0.0","instrumentation":{"enabled":false}}"#,
        )
        .unwrap();
        assert!(!settings.instrumentation.enabled);
        assert_eq!(settings.instrumentation.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_validation_failures() {
        let mut settings = Settings::default();
        settings.scopes.clear();
        assert_eq!(settings.validate(), Err(ValidationError::NoScopes));

        let mut settings = Settings::default();
        settings.scopes = vec![RegistryScope::LocalMachine, RegistryScope::LocalMachine];
        assert_eq!(
            settings.validate(),
            Err(ValidationError::DuplicateScope(RegistryScope::LocalMachine))
        );

        let mut settings = Settings::default();
        settings.instrumentation.timeout_secs = 0;
        assert_eq!(settings.validate(), Err(ValidationError::ZeroTimeout));

        let mut settings = Settings::default();
        settings.instrumentation.timeout_secs = u64::MAX;
        assert_eq!(settings.validate(), Err(ValidationError::TimeoutTooLarge(u64::MAX)));

        let mut settings = Settings::default();
        settings.instrumentation.timeout_secs = MAX_TIMEOUT_SECS;
        assert!(settings.validate().is_ok());

        let mut settings = Settings::default();
        settings.instrumentation.powershell = " ".into();
        assert_eq!(settings.validate(), Err(ValidationError::BlankPowershell));
    }

    #[test]
    fn test_unknown_scope_rejected() {
        let result: Result<Settings, _> =
            serde_json::from_str(r#"{"schema_version":"1.0.0","scopes":["classes_root"]}"#);
        assert!(result.is_err());
    }
}
