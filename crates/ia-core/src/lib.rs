//! Install Audit Core Library
//!
//! This library provides the core functionality for installed-software audits:
//! - Configuration store (registry) access, live or from a JSON snapshot
//! - Package enumeration
//! - Instrumentation install-date cache
//! - Filesystem metadata reader
//! - Install-date resolution and inventory orchestration
//! - Exit codes, configuration loading, logging, output schemas
//!
//! The binary entry point is in `main.rs`.

pub mod collect;
pub mod config;
pub mod exit_codes;
pub mod fsmeta;
pub mod instrumentation;
pub mod inventory;
pub mod logging;
pub mod registry;
pub mod report;
pub mod resolve;
pub mod schema;

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock_sources;

pub use inventory::{collect_inventory, Inventory, InventoryOptions, InventorySources};
pub use resolve::{InstallDateResolver, ResolutionSummary};
