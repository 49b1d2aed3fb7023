use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;
use chrono::Local;
use log::info;

use super::ReportRenderer;
use crate::store::{AggregateReport, LanguageSummary};
use crate::utils::file_utils;

const BAR_WIDTH: usize = 40;

/// Renders one section per language: a text bar chart of the most used
/// libraries followed by the full library table.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    /// Libraries shown in each chart
    pub chart_limit: usize,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self { chart_limit: 15 }
    }
}

impl MarkdownRenderer {
    pub fn format_report(&self, report: &AggregateReport) -> String {
        let mut out = String::new();

        out.push_str("# Footprint Report\n\n");
        let _ = writeln!(out, "- **Subject:** {}", report.subject_identifier);
        let _ = writeln!(out, "- **Generated:** {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "- **Languages:** {}", report.language_summaries.len());
        let _ = writeln!(out, "- **Files:** {}\n", report.total_files());

        if report.language_summaries.is_empty() {
            out.push_str("No projects were scanned.\n");
            return out;
        }

        out.push_str("| Language | Files | Libraries |\n");
        out.push_str("|----------|-------|-----------|\n");
        for summary in &report.language_summaries {
            let _ = writeln!(
                out,
                "| {} | {} | {} |",
                capitalize(&summary.language),
                summary.file_count,
                summary.libraries.len()
            );
        }

        for summary in &report.language_summaries {
            out.push_str("\n---\n\n");
            self.format_language(&mut out, summary);
        }

        out
    }

    fn format_language(&self, out: &mut String, summary: &LanguageSummary) {
        let _ = writeln!(
            out,
            "## {} (Files: {})\n",
            capitalize(&summary.language),
            summary.file_count
        );

        if summary.libraries.is_empty() {
            out.push_str("No external libraries or imports detected.\n");
            return;
        }

        let shown = &summary.libraries[..summary.libraries.len().min(self.chart_limit)];
        let max = shown.iter().map(|l| l.times_imported).max().unwrap_or(0).max(1);
        let label_width = shown.iter().map(|l| l.library_name.chars().count()).max().unwrap_or(0);

        out.push_str("```text\n");
        for lib in shown {
            let filled = (lib.times_imported * BAR_WIDTH).div_ceil(max);
            let _ = writeln!(
                out,
                "{:<width$} | {} {}",
                lib.library_name,
                "#".repeat(filled),
                lib.times_imported,
                width = label_width
            );
        }
        out.push_str("```\n\n");

        out.push_str("| Library | Imports |\n");
        out.push_str("|---------|---------|\n");
        for lib in &summary.libraries {
            let _ = writeln!(out, "| `{}` | {} |", lib.library_name.replace('|', "\\|"), lib.times_imported);
        }
    }
}

impl ReportRenderer for MarkdownRenderer {
    fn extension(&self) -> &str {
        "md"
    }

    fn render(&self, report: &AggregateReport, destination: &Path) -> Result<()> {
        file_utils::write_string_atomically(destination, &self.format_report(report))?;
        info!("Rendered report at: {}", destination.display());
        Ok(())
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibraryUsage;

    fn report() -> AggregateReport {
        AggregateReport {
            subject_identifier: "octocat".to_string(),
            language_summaries: vec![
                LanguageSummary {
                    language: "python".to_string(),
                    libraries: vec![LibraryUsage::new("requests", 4), LibraryUsage::new("os", 2)],
                    file_count: 2,
                },
                LanguageSummary {
                    language: "javascript".to_string(),
                    libraries: Vec::new(),
                    file_count: 1,
                },
            ],
        }
    }

    #[test]
    fn test_sections_follow_report_order() {
        let text = MarkdownRenderer::default().format_report(&report());

        let python = text.find("## Python (Files: 2)").unwrap();
        let javascript = text.find("## Javascript (Files: 1)").unwrap();
        assert!(python < javascript);
        assert!(text.contains("| `requests` | 4 |"));
        assert!(text.contains("No external libraries or imports detected."));
        assert!(text.contains("- **Subject:** octocat"));
    }

    #[test]
    fn test_bars_scale_to_largest_count() {
        let text = MarkdownRenderer::default().format_report(&report());
        assert!(text.contains(&format!("requests | {} 4", "#".repeat(BAR_WIDTH))));
        assert!(text.contains(&format!("os       | {} 2", "#".repeat(BAR_WIDTH / 2))));
    }

    #[test]
    fn test_chart_limit() {
        let renderer = MarkdownRenderer { chart_limit: 1 };
        let text = renderer.format_report(&report());
        assert!(!text.contains("os       |"));
        assert!(text.contains("| `os` | 2 |"));
    }

    #[test]
    fn test_empty_report() {
        let empty = AggregateReport {
            subject_identifier: "unknown".to_string(),
            language_summaries: Vec::new(),
        };
        assert!(MarkdownRenderer::default().format_report(&empty).contains("No projects were scanned."));
    }
}
