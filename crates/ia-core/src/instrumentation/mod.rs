//! Instrumentation service access.
//!
//! The instrumentation service (WMI/CIM `Win32_Product`) reports install
//! dates for MSI-managed products. It is queried once per run, in bulk,
//! through the [`InstrumentationSource`] trait, and the rows are folded into
//! an [`InstallDateCache`].

mod cache;
mod cim;

pub use cache::{CacheStatus, InstallDateCache};
pub use cim::{parse_cim_json, CimProductQuery, CIM_PRODUCT_SCRIPT};

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// One product row as reported by the service.
///
/// Either field may be absent; such rows are dropped when the cache is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentationRow {
    pub name: Option<String>,
    /// Raw `yyyyMMdd` text, unparsed.
    pub install_date: Option<String>,
}

impl InstrumentationRow {
    pub fn new(name: impl Into<String>, install_date: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            install_date: Some(install_date.into()),
        }
    }
}

/// Whole-query failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("instrumentation query unavailable: {0}")]
    Unavailable(String),

    #[error("instrumentation query timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("instrumentation query failed: {0}")]
    Failed(String),

    #[error("instrumentation output malformed: {0}")]
    Malformed(String),
}

/// A bulk source of product install dates.
pub trait InstrumentationSource {
    /// Short description for logs.
    fn describe(&self) -> String;

    /// Fetch every product row in one call.
    fn query_install_dates(&self) -> Result<Vec<InstrumentationRow>, QueryError>;

    /// Whether this source deliberately returns nothing.
    fn is_disabled(&self) -> bool {
        false
    }
}

/// Fixed rows or a fixed failure.
#[derive(Debug, Clone)]
pub struct StaticInstrumentation {
    outcome: Result<Vec<InstrumentationRow>, QueryError>,
    label: String,
}

impl StaticInstrumentation {
    pub fn rows(rows: Vec<InstrumentationRow>) -> Self {
        Self {
            outcome: Ok(rows),
            label: "static".to_string(),
        }
    }

    pub fn failing(error: QueryError) -> Self {
        Self {
            outcome: Err(error),
            label: "static".to_string(),
        }
    }

    /// Load rows captured with `Get-CimInstance Win32_Product | ConvertTo-Json`.
    pub fn from_path(path: &Path) -> ia_common::Result<Self> {
        let invalid = |reason: String| ia_common::Error::SnapshotInvalid {
            path: path.to_path_buf(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let rows = parse_cim_json(&raw).map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            outcome: Ok(rows),
            label: format!("snapshot:{}", path.display()),
        })
    }
}

impl InstrumentationSource for StaticInstrumentation {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn query_install_dates(&self) -> Result<Vec<InstrumentationRow>, QueryError> {
        self.outcome.clone()
    }
}

/// Skips the service entirely; every lookup misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledInstrumentation;

impl InstrumentationSource for DisabledInstrumentation {
    fn describe(&self) -> String {
        "disabled".to_string()
    }

    fn query_install_dates(&self) -> Result<Vec<InstrumentationRow>, QueryError> {
        Ok(Vec::new())
    }

    fn is_disabled(&self) -> bool {
        true
    }
}
