//! JSON session report written at the end of `weaver run --report <path>`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::debug;

use crate::core::types::{SessionReport, TerminationReason};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReportRecord {
    pub termination_reason: TerminationReason,
    pub success_count: u32,
    pub failure_count: u32,
    pub elapsed_secs: f64,
    pub started_at: String,
    pub ended_at: String,
}

impl ReportRecord {
    pub fn new(report: &SessionReport, ended_at: DateTime<Local>) -> Self {
        let started_at = chrono::Duration::from_std(report.elapsed)
            .ok()
            .and_then(|elapsed| ended_at.checked_sub_signed(elapsed))
            .unwrap_or(ended_at);
        Self {
            termination_reason: report.termination_reason,
            success_count: report.success_count,
            failure_count: report.failure_count,
            elapsed_secs: report.elapsed.as_secs_f64(),
            started_at: started_at.to_rfc3339(),
            ended_at: ended_at.to_rfc3339(),
        }
    }
}

/// Atomically write the report as pretty JSON (temp file + rename).
pub fn write_report(path: &Path, record: &ReportRecord) -> Result<()> {
    debug!(
        path = %path.display(),
        reason = record.termination_reason.as_str(),
        "writing session report"
    );
    let mut buf = serde_json::to_string_pretty(record).context("serialize session report")?;
    buf.push('\n');
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp report {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace report {}", path.display()))?;
    Ok(())
}
