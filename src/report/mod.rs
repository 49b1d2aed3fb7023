pub mod markdown;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;

pub use markdown::MarkdownRenderer;

use crate::store::AggregateReport;
use crate::utils::file_utils;

/// Turns an aggregate report into a human-readable document.
///
/// Renderers only ever read the report; a failed render leaves the JSON
/// report untouched.
pub trait ReportRenderer: Send + Sync {
    /// Extension of the produced document, without the dot
    fn extension(&self) -> &str;

    fn render(&self, report: &AggregateReport, destination: &Path) -> Result<()>;
}

/// `report_<data_source>_<timestamp>.json`
pub fn report_file_name(data_source: &str, timestamp: &str) -> String {
    format!("report_{data_source}_{timestamp}.json")
}

/// Where a renderer's document goes next to a JSON report
pub fn rendered_path(json_report: &Path, renderer: &dyn ReportRenderer) -> PathBuf {
    json_report.with_extension(renderer.extension())
}

pub fn write_json_report(report: &AggregateReport, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let content = serde_json::to_string_pretty(report).context("Failed to serialize aggregate report")?;
    file_utils::write_string_atomically(path, &content)?;
    info!("Overall JSON report generated at: {}", path.display());
    Ok(())
}

pub fn read_json_report(path: impl AsRef<Path>) -> Result<AggregateReport> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read report {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse report {}", path.display()))
}
