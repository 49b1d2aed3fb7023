use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use indexmap::IndexMap;
use log::{debug, error, info, warn};
use serde_json::Value;

use super::storage::SnapshotStore;
use super::types::{
    AggregateReport, AggregationOutcome, LanguageSummary, LibraryUsage, RejectedSnapshot,
    SnapshotRejection, UNKNOWN_SUBJECT,
};
use crate::scanner::ProjectSnapshot;

#[derive(Debug, Default)]
struct LanguageTotals {
    file_count: usize,
    libraries: IndexMap<String, usize>,
}

/// Accumulates snapshots into an [`AggregateReport`].
///
/// Languages and libraries remember the order they were first seen in, and
/// the final sorts are stable, so equal counts keep that order.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    languages: IndexMap<String, LanguageTotals>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one project's totals; the language is lowercased
    pub fn add<'a>(
        &mut self,
        language: &str,
        file_count: usize,
        libraries: impl IntoIterator<Item = (&'a str, usize)>,
    ) {
        let totals = self.languages.entry(language.to_lowercase()).or_default();
        totals.file_count += file_count;
        for (name, count) in libraries {
            match totals.libraries.get_mut(name) {
                Some(total) => *total += count,
                None => {
                    totals.libraries.insert(name.to_string(), count);
                }
            }
        }
    }

    pub fn add_snapshot(&mut self, snapshot: &ProjectSnapshot) {
        self.add(
            &snapshot.detected_language,
            snapshot.file_count,
            snapshot.import_counts.iter().map(|(name, count)| (name.as_str(), *count)),
        );
    }

    pub fn finish(self, subject: impl Into<String>) -> AggregateReport {
        let mut language_summaries: Vec<LanguageSummary> = self
            .languages
            .into_iter()
            .map(|(language, totals)| {
                let mut libraries: Vec<LibraryUsage> = totals
                    .libraries
                    .into_iter()
                    .map(|(name, count)| LibraryUsage::new(name, count))
                    .collect();
                libraries.sort_by(|a, b| b.times_imported.cmp(&a.times_imported));

                debug!(
                    "Aggregated data for language: {} with {} libraries and {} files",
                    language,
                    libraries.len(),
                    totals.file_count
                );

                LanguageSummary {
                    language,
                    libraries,
                    file_count: totals.file_count,
                }
            })
            .collect();

        language_summaries.sort_by(|a, b| b.file_count.cmp(&a.file_count));

        AggregateReport {
            subject_identifier: subject.into(),
            language_summaries,
        }
    }
}

/// Fields the aggregator needs from one snapshot file
#[derive(Debug, Clone, PartialEq, Eq)]
struct SnapshotSummary {
    language: String,
    file_count: usize,
    libraries: Vec<(String, usize)>,
}

/// Reads snapshot files and merges them into one report
#[derive(Debug, Clone)]
pub struct Aggregator {
    subject: String,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(UNKNOWN_SUBJECT)
    }
}

impl Aggregator {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }

    /// Aggregate every snapshot currently listed in `store`.
    ///
    /// Only a failure to list the directory is an error; bad snapshots are
    /// logged and reported in [`AggregationOutcome::rejected`].
    pub fn aggregate_store(&self, store: &SnapshotStore) -> Result<AggregationOutcome> {
        info!("Starting to aggregate snapshots in {}", store.dir().display());
        let files = store.list()?;
        Ok(self.aggregate_files(&files))
    }

    /// Aggregate the given snapshot files in order
    pub fn aggregate_files(&self, files: &[PathBuf]) -> AggregationOutcome {
        let mut builder = ReportBuilder::new();
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();

        for path in files {
            debug!("Processing snapshot file: {}", path.display());
            match load_summary(path) {
                Ok(summary) => {
                    debug!(
                        "Found programming language: {} with {} files",
                        summary.language, summary.file_count
                    );
                    builder.add(
                        &summary.language,
                        summary.file_count,
                        summary.libraries.iter().map(|(name, count)| (name.as_str(), *count)),
                    );
                    accepted.push(path.clone());
                }
                Err(reason) => {
                    match reason {
                        SnapshotRejection::EmptyLanguage => {
                            warn!("No programming language specified in snapshot: {}", path.display())
                        }
                        _ => error!("Rejected snapshot {}: {}", path.display(), reason),
                    }
                    rejected.push(RejectedSnapshot {
                        path: path.clone(),
                        reason,
                    });
                }
            }
        }

        let report = builder.finish(self.subject.clone());
        info!(
            "Aggregated {} snapshots into {} languages ({} rejected)",
            accepted.len(),
            report.language_summaries.len(),
            rejected.len()
        );

        AggregationOutcome {
            report,
            accepted,
            rejected,
        }
    }

    /// Aggregate snapshots already in memory
    pub fn aggregate_snapshots<'a>(
        &self,
        snapshots: impl IntoIterator<Item = &'a ProjectSnapshot>,
    ) -> AggregateReport {
        let mut builder = ReportBuilder::new();
        for snapshot in snapshots {
            builder.add_snapshot(snapshot);
        }
        builder.finish(self.subject.clone())
    }
}

fn load_summary(path: &Path) -> Result<SnapshotSummary, SnapshotRejection> {
    let content =
        fs::read_to_string(path).map_err(|e| SnapshotRejection::Unreadable(e.to_string()))?;
    let value: Value =
        serde_json::from_str(&content).map_err(|e| SnapshotRejection::InvalidJson(e.to_string()))?;
    summarize(&value, path)
}

fn summarize(value: &Value, path: &Path) -> Result<SnapshotSummary, SnapshotRejection> {
    let object = value.as_object().ok_or(SnapshotRejection::NotAnObject)?;

    let language = object
        .get("programming_language")
        .ok_or(SnapshotRejection::MissingField("programming_language"))?;
    let file_count = object
        .get("file_count")
        .ok_or(SnapshotRejection::MissingField("file_count"))?;
    let libraries = object
        .get("external_libraries")
        .ok_or(SnapshotRejection::MissingField("external_libraries"))?;

    let language = language.as_str().ok_or(SnapshotRejection::WrongType {
        field: "programming_language",
        expected: "a string",
    })?;
    if language.is_empty() {
        return Err(SnapshotRejection::EmptyLanguage);
    }

    let file_count = file_count.as_u64().ok_or(SnapshotRejection::WrongType {
        field: "file_count",
        expected: "a non-negative integer",
    })? as usize;

    let entries = libraries.as_array().ok_or(SnapshotRejection::WrongType {
        field: "external_libraries",
        expected: "an array",
    })?;

    if entries.is_empty() {
        debug!("No external libraries found in {}", path.display());
    }

    let libraries = entries
        .iter()
        .filter_map(|entry| {
            let name = entry.get("import_name").and_then(Value::as_str);
            let count = entry.get("count").and_then(Value::as_u64);
            match (name, count) {
                (Some(name), Some(count)) => Some((name.to_string(), count as usize)),
                _ => {
                    warn!("Invalid library entry in {}: {}", path.display(), entry);
                    None
                }
            }
        })
        .collect();

    Ok(SnapshotSummary {
        language: language.to_lowercase(),
        file_count,
        libraries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    fn write_snapshot(dir: &Path, name: &str, value: &Value) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
        path
    }

    fn snapshot_json(language: &str, file_count: usize, libs: &[(&str, usize)]) -> Value {
        json!({
            "project_name": "p",
            "project_sources": [],
            "programming_language": language,
            "file_count": file_count,
            "external_libraries": libs
                .iter()
                .map(|(name, count)| json!({"import_name": name, "count": count}))
                .collect::<Vec<_>>(),
            "observations": []
        })
    }

    #[test]
    fn test_merges_same_language() {
        let dir = tempdir().unwrap();
        write_snapshot(dir.path(), "a_snapshot_1.json", &snapshot_json("python", 1, &[("os", 2)]));
        write_snapshot(dir.path(), "b_snapshot_1.json", &snapshot_json("Python", 2, &[("os", 3), ("sys", 1)]));

        let outcome = Aggregator::default()
            .aggregate_store(&SnapshotStore::new(dir.path()))
            .unwrap();

        let python = outcome.report.language("python").unwrap();
        assert_eq!(python.file_count, 3);
        assert_eq!(
            python.libraries,
            vec![LibraryUsage::new("os", 5), LibraryUsage::new("sys", 1)]
        );
        assert_eq!(outcome.report.language_summaries.len(), 1);
        assert_eq!(outcome.report.subject_identifier, "unknown");
    }

    #[test]
    fn test_equal_counts_keep_first_seen_order() {
        let dir = tempdir().unwrap();
        let files = vec![
            write_snapshot(dir.path(), "1_snapshot_x.json", &snapshot_json("go", 2, &[("fmt", 1), ("os", 1)])),
            write_snapshot(dir.path(), "2_snapshot_x.json", &snapshot_json("rust", 2, &[])),
            write_snapshot(dir.path(), "3_snapshot_x.json", &snapshot_json("java", 5, &[])),
        ];

        let report = Aggregator::new("octocat").aggregate_files(&files).report;

        let order: Vec<_> = report.language_summaries.iter().map(|s| s.language.as_str()).collect();
        assert_eq!(order, vec!["java", "go", "rust"]);
        let go_libs: Vec<_> = report.language("go").unwrap().libraries.iter().map(|l| l.library_name.as_str()).collect();
        assert_eq!(go_libs, vec!["fmt", "os"]);
        assert_eq!(report.subject_identifier, "octocat");
    }

    #[test]
    fn test_missing_file_count_is_excluded_not_fatal() {
        let dir = tempdir().unwrap();
        let mut broken = snapshot_json("python", 9, &[("os", 9)]);
        broken.as_object_mut().unwrap().remove("file_count");
        write_snapshot(dir.path(), "a_snapshot_1.json", &broken);
        write_snapshot(dir.path(), "b_snapshot_1.json", &snapshot_json("python", 1, &[("os", 1)]));
        fs::write(dir.path().join("c_snapshot_1.json"), "{ not json").unwrap();

        let outcome = Aggregator::default()
            .aggregate_store(&SnapshotStore::new(dir.path()))
            .unwrap();

        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.rejected.len(), 2);
        assert_eq!(outcome.rejected[0].reason, SnapshotRejection::MissingField("file_count"));
        assert!(matches!(outcome.rejected[1].reason, SnapshotRejection::InvalidJson(_)));

        let python = outcome.report.language("python").unwrap();
        assert_eq!(python.file_count, 1);
        assert_eq!(python.libraries, vec![LibraryUsage::new("os", 1)]);
    }

    #[test]
    fn test_vanished_file_is_rejected() {
        let dir = tempdir().unwrap();
        let outcome = Aggregator::default().aggregate_files(&[dir.path().join("gone_snapshot_1.json")]);
        assert!(matches!(outcome.rejected[0].reason, SnapshotRejection::Unreadable(_)));
        assert!(outcome.report.language_summaries.is_empty());
    }

    #[test]
    fn test_empty_language_and_bad_library_entries() {
        let value = json!({
            "programming_language": "",
            "file_count": 1,
            "external_libraries": []
        });
        assert_eq!(summarize(&value, Path::new("x")), Err(SnapshotRejection::EmptyLanguage));

        let value = json!({
            "programming_language": "JavaScript",
            "file_count": 2,
            "external_libraries": [
                {"import_name": "react", "count": 2},
                {"import_name": "broken"},
                "nonsense"
            ]
        });
        let summary = summarize(&value, Path::new("x")).unwrap();
        assert_eq!(summary.language, "javascript");
        assert_eq!(summary.libraries, vec![("react".to_string(), 2)]);
    }

    #[test]
    fn test_wrong_types_are_rejected() {
        let value = json!({
            "programming_language": "go",
            "file_count": "three",
            "external_libraries": []
        });
        assert!(matches!(
            summarize(&value, Path::new("x")),
            Err(SnapshotRejection::WrongType { field: "file_count", .. })
        ));
        assert_eq!(summarize(&json!([1, 2]), Path::new("x")), Err(SnapshotRejection::NotAnObject));
    }

    #[test]
    fn test_unknown_language_is_its_own_summary() {
        let dir = tempdir().unwrap();
        let files = vec![
            write_snapshot(dir.path(), "a_snapshot_1.json", &snapshot_json("unknown", 4, &[])),
            write_snapshot(dir.path(), "b_snapshot_1.json", &snapshot_json("python", 1, &[])),
        ];

        let report = Aggregator::default().aggregate_files(&files).report;
        assert_eq!(report.language_summaries[0].language, "unknown");
        assert_eq!(report.language_summaries[0].file_count, 4);
        assert!(report.language_summaries[1].libraries.is_empty());
    }
}
