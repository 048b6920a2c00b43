//! Install audit common types and errors.
//!
//! This crate provides foundational types shared across ia-core modules:
//! - The installed-package record and its resolved install date
//! - The strict `yyyyMMdd` install-date codec
//! - Common error types
//! - Output format specifications

pub mod app;
pub mod date;
pub mod error;
pub mod output;

pub use app::{DateSource, InstalledApp, RegistryScope, RegistryView, ResolvedInstallDate};
pub use date::{date_at_midnight, parse_install_date};
pub use error::{Error, Result};
pub use output::OutputFormat;

/// Schema version of the inventory output envelope.
pub const SCHEMA_VERSION: &str = "1.0.0";
