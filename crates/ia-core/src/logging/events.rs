//! Structured event vocabulary.
//!
//! Every event carries the run correlation IDs and the pipeline stage it
//! belongs to. Event names are stable and are used as tracing targets.

use serde::{Deserialize, Serialize};

/// Stages of an inventory run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Walking the package registrations.
    Enumerate,
    /// Building the instrumentation install-date cache.
    Cache,
    /// Applying the install-date fallback chain.
    Resolve,
    /// Rendering the command payload.
    Output,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Enumerate => "enumerate",
            Stage::Cache => "cache",
            Stage::Resolve => "resolve",
            Stage::Output => "output",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const INVENTORY_STARTED: &str = "inventory.started";
    pub const INVENTORY_FINISHED: &str = "inventory.finished";

    // Enumerate stage
    pub const ENUM_ROOT_MISSING: &str = "enumerate.root_missing";
    pub const ENUM_ROOT_FAILED: &str = "enumerate.root_failed";
    pub const ENUM_FINISHED: &str = "enumerate.finished";

    // Cache stage
    pub const CACHE_BUILT: &str = "cache.built";
    pub const CACHE_DEGRADED: &str = "cache.degraded";
    pub const CACHE_DISABLED: &str = "cache.disabled";

    // Resolve stage
    pub const RESOLVE_FINISHED: &str = "resolve.finished";

    // Config/init events
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";

    // Error events
    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// Correlation IDs attached to every event of one run.
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Unique ID for this invocation.
    pub run_id: String,
    /// Host identifier.
    pub host_id: String,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>, host_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            host_id: host_id.into(),
        }
    }

    /// Context for library callers that have no run of their own.
    pub fn detached() -> Self {
        LogContext::new(super::generate_run_id(), super::get_host_id())
    }
}
