//! Package collection.
//!
//! This module provides the evidence collection layer for an inventory run:
//! - Enumeration of package registrations from the configuration store
//! - Tool runner for bounded execution of external queries
//!
//! The collection layer produces [`InstalledApp`](ia_common::InstalledApp)
//! records that feed into install-date resolution.

mod enumerate;
pub mod tool_runner;
mod types;

pub use enumerate::{clean_icon_path, enumerate_installed_apps};
pub use tool_runner::{
    ToolConfig, ToolError, ToolOutput, ToolRunner, ToolRunnerBuilder, ToolSpec,
    DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIMEOUT_SECS, MAX_TIMEOUT_SECS,
};
pub use types::{Enumeration, EnumerationMetadata, EnumerationOptions};
