use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Subject used when the run's account cannot be resolved
pub const UNKNOWN_SUBJECT: &str = "unknown";

/// Cross-project, cross-language rollup of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateReport {
    /// Account the run is for, `"unknown"` if not resolvable
    #[serde(rename = "github_user_name")]
    pub subject_identifier: String,

    /// Sorted by descending file count
    #[serde(rename = "programming_languages")]
    pub language_summaries: Vec<LanguageSummary>,
}

impl AggregateReport {
    pub fn language(&self, language: &str) -> Option<&LanguageSummary> {
        self.language_summaries.iter().find(|s| s.language == language)
    }

    pub fn total_files(&self) -> usize {
        self.language_summaries.iter().map(|s| s.file_count).sum()
    }
}

/// All snapshots of one language, merged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageSummary {
    #[serde(rename = "programming_language")]
    pub language: String,

    /// Sorted by descending import count
    #[serde(rename = "libraries_used")]
    pub libraries: Vec<LibraryUsage>,

    pub file_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryUsage {
    pub library_name: String,
    pub times_imported: usize,
}

impl LibraryUsage {
    pub fn new(library_name: impl Into<String>, times_imported: usize) -> Self {
        Self {
            library_name: library_name.into(),
            times_imported,
        }
    }
}

/// Why a snapshot file was left out of an aggregation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotRejection {
    #[error("cannot read snapshot: {0}")]
    Unreadable(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("snapshot is not a JSON object")]
    NotAnObject,

    #[error("'{0}' missing")]
    MissingField(&'static str),

    #[error("'{field}' must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("no programming language specified")]
    EmptyLanguage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedSnapshot {
    pub path: PathBuf,
    pub reason: SnapshotRejection,
}

/// The report plus what went into it
#[derive(Debug, Clone)]
pub struct AggregationOutcome {
    pub report: AggregateReport,

    /// Snapshot files that contributed, in enumeration order
    pub accepted: Vec<PathBuf>,

    pub rejected: Vec<RejectedSnapshot>,
}
