use std::path::PathBuf;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::ClassifierConfig;

/// Language tag used when no admitted file maps to a known language
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Observation appended to snapshots without a single import
pub const NO_IMPORTS_OBSERVATION: &str =
    "No external libraries or imports were detected in the source code.";

/// One admitted, successfully decoded source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Base name of the file
    #[serde(rename = "File")]
    pub file_name: String,

    /// Path as discovered by the walker
    #[serde(rename = "Full Path")]
    pub full_path: PathBuf,

    /// Path relative to the project root
    #[serde(rename = "Relative Path")]
    pub relative_path: PathBuf,

    /// Size in bytes
    #[serde(rename = "Size")]
    pub size: u64,

    /// Local modification time, second precision
    #[serde(rename = "Last Modified", with = "last_modified")]
    pub last_modified: NaiveDateTime,

    /// Number of lines in the content
    #[serde(rename = "Lines")]
    pub lines: usize,

    /// Full text content
    #[serde(rename = "Source_Code")]
    pub source_code: String,
}

/// The structured record of one project's scanned contents.
///
/// Serializes to the on-disk snapshot layout: files are wrapped as
/// `{"file": {...}}` entries under `project_sources` and import counts are
/// written as an ordered `external_libraries` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub project_name: String,

    #[serde(rename = "project_sources", with = "source_list")]
    pub source_files: Vec<FileRecord>,

    #[serde(rename = "programming_language")]
    pub detected_language: String,

    pub file_count: usize,

    #[serde(rename = "external_libraries", with = "import_list")]
    pub import_counts: IndexMap<String, usize>,

    #[serde(default)]
    pub observations: Vec<String>,
}

/// Statistics about one project scan
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Regular files visited by the walker (pruned subtrees excluded)
    pub files_visited: usize,

    /// Files the classifier rejected
    pub files_skipped: usize,

    /// Files admitted into the snapshot
    pub files_included: usize,

    /// Directories not descended into
    pub pruned_dirs: usize,

    /// Included files that were not valid UTF-8
    pub decode_error_paths: Vec<PathBuf>,

    /// Included files that could not be read or stat'ed
    pub read_error_paths: Vec<PathBuf>,

    /// Entries the walker itself could not access
    pub walk_error_paths: Vec<PathBuf>,
}

impl ScanStats {
    /// Every file that was dropped because of an I/O or decoding problem
    pub fn failed_files(&self) -> usize {
        self.decode_error_paths.len() + self.read_error_paths.len()
    }
}

/// Configuration options for project scanning
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Lookup tables for the file classifier
    pub classifier: ClassifierConfig,

    /// Log every skipped file at debug level
    pub verbose: bool,

    /// Follow symbolic links while walking
    pub follow_links: bool,

    /// Number of parallel threads used when scanning several projects
    pub parallel_threads: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            verbose: false,
            follow_links: false,
            parallel_threads: None,
        }
    }
}

/// Result of scanning one project
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub snapshot: ProjectSnapshot,
    pub stats: ScanStats,
}

mod last_modified {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

mod source_list {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::FileRecord;

    #[derive(Serialize)]
    struct EntryRef<'a> {
        file: &'a FileRecord,
    }

    #[derive(Deserialize)]
    struct Entry {
        file: FileRecord,
    }

    pub fn serialize<S: Serializer>(files: &[FileRecord], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(files.iter().map(|file| EntryRef { file }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<FileRecord>, D::Error> {
        let entries = Vec::<Entry>::deserialize(deserializer)?;
        Ok(entries.into_iter().map(|e| e.file).collect())
    }
}

mod import_list {
    use indexmap::IndexMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize)]
    struct ImportCountRef<'a> {
        import_name: &'a str,
        count: usize,
    }

    #[derive(Deserialize)]
    struct ImportCount {
        import_name: String,
        count: usize,
    }

    pub fn serialize<S: Serializer>(
        counts: &IndexMap<String, usize>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(counts.iter().map(|(name, count)| ImportCountRef {
            import_name: name,
            count: *count,
        }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<IndexMap<String, usize>, D::Error> {
        let entries = Vec::<ImportCount>::deserialize(deserializer)?;
        let mut counts = IndexMap::with_capacity(entries.len());
        for entry in entries {
            *counts.entry(entry.import_name).or_insert(0) += entry.count;
        }
        Ok(counts)
    }
}
