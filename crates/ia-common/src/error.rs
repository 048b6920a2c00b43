//! Error types for install audit.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! Only failures that prevent an inventory run from starting at all are
//! represented here. Missing registry keys, malformed dates, absent files and
//! a failed instrumentation query are data gaps, not errors, and never reach
//! this type.
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Registry Snapshot Invalid
//!   Reason: invalid registry snapshot /tmp/reg.json: expected value at line 1
//!   Fix: Re-export the snapshot, or check it with 'jq . <file>'.
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for install audit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Settings file errors.
    Config,
    /// Configuration store (registry) access errors.
    Registry,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Registry => write!(f, "registry"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Suggested actions for automation to take in response to errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Retry the operation.
    Retry,
    /// Run validation/check command.
    RunCheck,
    /// Supply a registry snapshot instead of the live store.
    UseSnapshot,
    /// Manual intervention required.
    ManualIntervention,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::RunCheck => write!(f, "run_check"),
            SuggestedAction::UseSnapshot => write!(f, "use_snapshot"),
            SuggestedAction::ManualIntervention => write!(f, "manual_intervention"),
        }
    }
}

/// Unified error type for install audit.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    // Registry errors (20-29)
    #[error("registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("invalid registry snapshot {path}: {reason}")]
    SnapshotInvalid { path: PathBuf, reason: String },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Registry errors
    /// - 60-69: I/O errors
    ///
    /// Codes of retired variants are not reused.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidSettings(_) => 11,
            Error::RegistryUnavailable(_) => 20,
            Error::SnapshotInvalid { .. } => 22,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidSettings(_) => ErrorCategory::Config,

            Error::RegistryUnavailable(_) | Error::SnapshotInvalid { .. } => ErrorCategory::Registry,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) => true,
            Error::InvalidSettings(_) => true,

            Error::RegistryUnavailable(_) => true, // Snapshot mode works anywhere
            Error::SnapshotInvalid { .. } => true,

            Error::Io(_) => true,
            Error::Json(_) => true,
        }
    }

    /// Returns the suggested action for automation.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Config(_) => SuggestedAction::RunCheck,
            Error::InvalidSettings(_) => SuggestedAction::RunCheck,

            Error::RegistryUnavailable(_) => SuggestedAction::UseSnapshot,
            Error::SnapshotInvalid { .. } => SuggestedAction::ManualIntervention,

            Error::Io(_) => SuggestedAction::Retry,
            Error::Json(_) => SuggestedAction::ManualIntervention,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => {
                "Run 'ia-core config validate' to check the settings file."
            }
            Error::InvalidSettings(_) => {
                "Fix the reported field in settings.json, or delete the file to use defaults."
            }
            Error::RegistryUnavailable(_) => {
                "Run on Windows, or pass '--registry-snapshot <file>' to audit an exported snapshot."
            }
            Error::SnapshotInvalid { .. } => {
                "Re-export the snapshot, or check it with 'jq . <file>'."
            }
            Error::Io(_) => {
                "Check disk space, permissions, and that config directories exist. Retry the operation."
            }
            Error::Json(_) => {
                "Invalid JSON in file. Check syntax with 'jq . <file>' or restore from backup."
            }
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidSettings(_) => "Invalid Settings",
            Error::RegistryUnavailable(_) => "Registry Unavailable",
            Error::SnapshotInvalid { .. } => "Registry Snapshot Invalid",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Suggested action for automation.
    pub suggested_action: SuggestedAction,

    /// Additional structured context (e.g., snapshot path).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        if let Error::SnapshotInvalid { path, .. } = err {
            context.insert("snapshot".to_string(), serde_json::json!(path));
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}
