//! # JSON Report Module
//!
//! Writes a scenario report to disk so CI jobs can archive it.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::core::models::{ScenarioOutcome, TestReport};

#[derive(Debug, Serialize)]
struct ReportDocument<'a> {
    generated_at: DateTime<Utc>,
    subject: String,
    passed: usize,
    failed: usize,
    exit_code: i32,
    scenarios: &'a [ScenarioOutcome],
}

/// Renders `report` as pretty JSON.
pub fn render_report(report: &TestReport, subject: &Path) -> Result<String> {
    let document = ReportDocument {
        generated_at: Utc::now(),
        subject: subject.display().to_string(),
        passed: report.passed(),
        failed: report.failed(),
        exit_code: report.exit_code(),
        scenarios: report.outcomes(),
    };
    serde_json::to_string_pretty(&document).context("Failed to serialize test report")
}

/// Writes the report to `path`, creating parent directories as needed.
pub fn write_report(report: &TestReport, subject: &Path, path: &Path) -> Result<()> {
    let rendered = render_report(report, subject)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create report directory: {}", parent.display()))?;
    }
    fs::write(path, rendered)
        .with_context(|| format!("Failed to write test report: {}", path.display()))
}
