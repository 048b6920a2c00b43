//! `Win32_Product` query via PowerShell CIM cmdlets.
//!
//! The query runs out of process so a hung provider can be killed: the
//! product enumeration behind `Win32_Product` is notoriously slow and has no
//! timeout of its own.

use super::{InstrumentationRow, InstrumentationSource, QueryError};
use crate::collect::tool_runner::{ToolError, ToolRunner, ToolSpec};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Script passed to PowerShell. Emits compact JSON with `Name` and `InstallDate`.
///
/// Console output is switched to UTF-8 first; the default OEM code page
/// mangles non-ASCII product names before they reach the cache.
pub const CIM_PRODUCT_SCRIPT: &str = "[Console]::OutputEncoding = [Text.Encoding]::UTF8; \
     Get-CimInstance -ClassName Win32_Product -ErrorAction Stop \
     | Select-Object Name,InstallDate | ConvertTo-Json -Compress";

/// Characters of stderr kept in failure messages.
const STDERR_EXCERPT_CHARS: usize = 200;

/// [`InstrumentationSource`] backed by `powershell.exe`.
#[derive(Debug, Clone)]
pub struct CimProductQuery {
    runner: ToolRunner,
    powershell: String,
    timeout: Duration,
    max_output_bytes: usize,
}

impl CimProductQuery {
    pub fn new(runner: ToolRunner, powershell: impl Into<String>, timeout: Duration) -> Self {
        let max_output_bytes = runner.config().max_output_bytes;
        Self {
            runner,
            powershell: powershell.into(),
            timeout,
            max_output_bytes,
        }
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            self.powershell.clone(),
            vec![
                "-NoProfile".to_string(),
                "-NonInteractive".to_string(),
                "-Command".to_string(),
                CIM_PRODUCT_SCRIPT.to_string(),
            ],
        )
        .with_timeout(self.timeout)
        .with_max_output(self.max_output_bytes)
    }
}

impl InstrumentationSource for CimProductQuery {
    fn describe(&self) -> String {
        format!("cim:{}", self.powershell)
    }

    fn query_install_dates(&self) -> Result<Vec<InstrumentationRow>, QueryError> {
        let output = self.runner.run(&self.spec()).map_err(|e| match e {
            ToolError::CommandNotFound(cmd) => QueryError::Unavailable(format!("{} not found", cmd)),
            other => QueryError::Failed(other.to_string()),
        })?;

        if output.timed_out {
            return Err(QueryError::Timeout {
                seconds: self.timeout.as_secs(),
            });
        }
        if !output.success() {
            let stderr = output.stderr_str();
            let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT_CHARS).collect();
            return Err(QueryError::Failed(format!(
                "exit code {:?}: {}",
                output.exit_code, excerpt
            )));
        }
        if output.truncated {
            return Err(QueryError::Malformed(format!(
                "output exceeded {} bytes",
                self.max_output_bytes
            )));
        }

        let rows = parse_cim_json(&output.stdout_str())?;
        debug!(rows = rows.len(), duration_ms = output.duration.as_millis() as u64, "cim query complete");
        Ok(rows)
    }
}

#[derive(Debug, Deserialize)]
struct CimProduct {
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "InstallDate", default)]
    install_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CimPayload {
    Many(Vec<CimProduct>),
    One(CimProduct),
}

/// Parse `ConvertTo-Json` output.
///
/// PowerShell emits an array for several objects, a bare object for exactly
/// one, and nothing at all for none. All three are accepted.
pub fn parse_cim_json(raw: &str) -> Result<Vec<InstrumentationRow>, QueryError> {
    let trimmed = raw.trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let payload: CimPayload =
        serde_json::from_str(trimmed).map_err(|e| QueryError::Malformed(e.to_string()))?;
    let products = match payload {
        CimPayload::Many(products) => products,
        CimPayload::One(product) => vec![product],
    };

    Ok(products
        .into_iter()
        .map(|p| InstrumentationRow {
            name: p.name,
            install_date: p.install_date,
        })
        .collect())
}
