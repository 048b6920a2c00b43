//! Install-date cache over one bulk instrumentation query.
//!
//! Per-package queries against the instrumentation service are slow (each
//! one enumerates every product), so the whole product table is fetched once
//! and indexed by lowercase name. The cache is read-only once built and lives
//! only as long as the run that built it.

use super::{InstrumentationRow, InstrumentationSource};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// How the cache was populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CacheStatus {
    /// Query succeeded.
    Loaded {
        /// Rows returned by the service, before filtering.
        rows: usize,
    },
    /// Query failed; the cache is empty.
    Degraded { reason: String },
    /// Instrumentation was turned off.
    Disabled,
}

/// Case-insensitive name → raw install date table.
#[derive(Debug, Clone)]
pub struct InstallDateCache {
    entries: HashMap<String, String>,
    status: CacheStatus,
}

impl InstallDateCache {
    /// Run the source's bulk query and index the result.
    ///
    /// Never fails: a query error yields an empty cache with
    /// [`CacheStatus::Degraded`].
    pub fn build(source: &dyn InstrumentationSource) -> Self {
        if source.is_disabled() {
            debug!("instrumentation disabled");
            return Self {
                entries: HashMap::new(),
                status: CacheStatus::Disabled,
            };
        }

        match source.query_install_dates() {
            Ok(rows) => {
                let count = rows.len();
                let cache = Self::from_rows(rows);
                debug!(
                    source = %source.describe(),
                    rows = count,
                    entries = cache.len(),
                    "instrumentation cache built"
                );
                Self {
                    status: CacheStatus::Loaded { rows: count },
                    ..cache
                }
            }
            Err(e) => {
                warn!(source = %source.describe(), error = %e, "instrumentation query failed, continuing without it");
                Self {
                    entries: HashMap::new(),
                    status: CacheStatus::Degraded {
                        reason: e.to_string(),
                    },
                }
            }
        }
    }

    /// Index rows directly. Blank names or dates are dropped; the last duplicate wins.
    pub fn from_rows(rows: impl IntoIterator<Item = InstrumentationRow>) -> Self {
        let mut entries = HashMap::new();
        let mut count = 0usize;
        for row in rows {
            count += 1;
            let (Some(name), Some(date)) = (row.name, row.install_date) else {
                continue;
            };
            if name.trim().is_empty() || date.trim().is_empty() {
                continue;
            }
            entries.insert(name.to_lowercase(), date);
        }
        Self {
            entries,
            status: CacheStatus::Loaded { rows: count },
        }
    }

    /// An empty cache, as if instrumentation were turned off.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            status: CacheStatus::Disabled,
        }
    }

    /// Raw install date recorded for `name`, compared case-insensitively.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.entries.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn status(&self) -> &CacheStatus {
        &self.status
    }
}
