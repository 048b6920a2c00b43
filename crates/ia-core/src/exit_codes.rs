//! Exit codes for the ia-core CLI.
//!
//! Exit codes communicate the run outcome without requiring output parsing.
//!
//! Exit code ranges:
//! - 0-1: Operational outcomes
//! - 10-19: User/environment errors (recoverable by user action)
//! - 20-29: Internal errors

use ia_common::error::ErrorCategory;

/// Exit codes for ia-core operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Operational Outcomes (0-1)
    // ========================================================================
    /// Every record has an install date
    Clean = 0,

    /// Inventory produced, but some records have no install date
    Unresolved = 1,

    // ========================================================================
    // User / Environment Errors (10-19)
    // ========================================================================
    /// Invalid arguments or configuration
    ArgsError = 10,

    /// Required capability missing (no live registry on this platform)
    CapabilityError = 11,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Codes 0-1.
    pub fn is_operational(self) -> bool {
        (self as i32) < 10
    }

    /// Codes 10-19.
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    /// Codes 20 and up.
    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Get the code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::Unresolved => "OK_UNRESOLVED",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::CapabilityError => "ERR_CAPABILITY",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }

    /// Exit code for a failed command.
    pub fn for_error(err: &ia_common::Error) -> Self {
        match err {
            ia_common::Error::RegistryUnavailable(_) => ExitCode::CapabilityError,
            // Only payload serialization produces these.
            ia_common::Error::Json(_) => ExitCode::InternalError,
            _ => match err.category() {
                ErrorCategory::Config | ErrorCategory::Registry => ExitCode::ArgsError,
                ErrorCategory::Io => ExitCode::IoError,
            },
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_ranges() {
        assert!(ExitCode::Clean.is_operational());
        assert!(ExitCode::Unresolved.is_operational());
        assert!(ExitCode::CapabilityError.is_user_error());
        assert!(ExitCode::IoError.is_internal_error());
        assert!(!ExitCode::ArgsError.is_internal_error());
    }

    #[test]
    fn test_display() {
        assert_eq!(ExitCode::Unresolved.to_string(), "OK_UNRESOLVED (1)");
        assert_eq!(i32::from(ExitCode::IoError), 21);
    }

    #[test]
    fn test_for_error() {
        use ia_common::Error;
        assert_eq!(
            ExitCode::for_error(&Error::RegistryUnavailable("linux".into())),
            ExitCode::CapabilityError
        );
        assert_eq!(
            ExitCode::for_error(&Error::SnapshotInvalid {
                path: PathBuf::from("x.json"),
                reason: "bad".into()
            }),
            ExitCode::ArgsError
        );
        assert_eq!(
            ExitCode::for_error(&Error::InvalidSettings("no scopes".into())),
            ExitCode::ArgsError
        );
        assert_eq!(
            ExitCode::for_error(&Error::Io(std::io::Error::other("disk"))),
            ExitCode::IoError
        );
        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(ExitCode::for_error(&Error::Json(json)), ExitCode::InternalError);
    }
}
