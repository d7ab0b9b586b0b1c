use std::fs;
use std::path::Path;

use super::RunReport;
use crate::error::Result;

/// Save a run report as two-space-indented JSON.
pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    tracing::debug!(path = %path.display(), "usage report written");
    Ok(())
}
