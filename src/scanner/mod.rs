pub mod classifier;
pub mod file_collector;
pub mod imports;
pub mod progress;
pub mod types;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use chrono::{DateTime, Local, NaiveDateTime, Timelike};
use log::{debug, info, warn};

pub use classifier::{Classification, FileClassifier, language_for_extension};
pub use file_collector::{CollectedFile, Collection, FileCollector};
pub use imports::{ImportExtractor, ImportHeuristic};
pub use progress::{ProgressEvent, ProgressReporter, ProgressTracker};
pub use types::{FileRecord, ProjectSnapshot, ScanOptions, ScanResult, ScanStats};

use crate::store::SnapshotStore;
use crate::utils::file_utils;
use types::{NO_IMPORTS_OBSERVATION, UNKNOWN_LANGUAGE};

/// Turns one project directory into a [`ProjectSnapshot`]
#[derive(Debug)]
pub struct ProjectScanner {
    /// Configuration options for scanning
    options: ScanOptions,

    /// Walks the tree and applies the classifier
    file_collector: FileCollector,

    /// Per-language import heuristics
    extractor: ImportExtractor,
}

/// Why an admitted file did not make it into the snapshot
enum ReadFailure {
    Decode,
    Io,
}

impl ProjectScanner {
    pub fn new(options: ScanOptions) -> Self {
        let file_collector = FileCollector::new(FileClassifier::new(options.classifier.clone()))
            .follow_links(options.follow_links)
            .verbose(options.verbose);

        Self {
            options,
            file_collector,
            extractor: ImportExtractor::default(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ScanOptions::default())
    }

    /// Replace the import heuristics
    pub fn with_extractor(mut self, extractor: ImportExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Scan one project.
    ///
    /// Unreadable and non UTF-8 files are logged, counted in the stats and
    /// left out; only a missing root is an error.
    pub fn scan(&self, root: impl AsRef<Path>) -> Result<ScanResult> {
        let root = root.as_ref();
        if !root.is_dir() {
            bail!("Project root {} is not a directory", root.display());
        }

        info!("Scanning project {} at {}", file_utils::base_name(root), root.display());
        let collection = self.file_collector.collect_files(root);
        Ok(self.build_snapshot(root, collection))
    }

    /// Read every collected file and fold it into the project's snapshot
    fn build_snapshot(&self, root: &Path, collection: Collection) -> ScanResult {
        let project_name = file_utils::base_name(root);

        let mut stats = ScanStats {
            files_visited: collection.files_visited,
            files_skipped: collection.files_skipped,
            pruned_dirs: collection.pruned_dirs,
            walk_error_paths: collection.walk_error_paths,
            ..ScanStats::default()
        };

        let mut snapshot = ProjectSnapshot {
            project_name,
            source_files: Vec::with_capacity(collection.files.len()),
            detected_language: String::new(),
            file_count: 0,
            import_counts: Default::default(),
            observations: Vec::new(),
        };
        let mut detected_language: Option<&'static str> = None;

        for file in collection.files {
            let record = match read_record(&file) {
                Ok(record) => record,
                Err((ReadFailure::Decode, reason)) => {
                    warn!("Skipping file {} due to decoding error: {}", file.path.display(), reason);
                    stats.decode_error_paths.push(file.path);
                    continue;
                }
                Err((ReadFailure::Io, reason)) => {
                    warn!("Skipping file {} due to read error: {}", file.path.display(), reason);
                    stats.read_error_paths.push(file.path);
                    continue;
                }
            };

            let extension = file_utils::file_extension(&record.file_name).unwrap_or_default();

            for name in self.extractor.extract(&record.source_code, &extension) {
                match snapshot.import_counts.get_mut(name) {
                    Some(count) => *count += 1,
                    None => {
                        snapshot.import_counts.insert(name.to_string(), 1);
                    }
                }
            }

            if detected_language.is_none() {
                detected_language = language_for_extension(&extension);
                if let Some(language) = detected_language {
                    debug!("Detected {} from {}", language, record.relative_path.display());
                }
            }

            snapshot.source_files.push(record);
        }

        snapshot.detected_language = detected_language.unwrap_or(UNKNOWN_LANGUAGE).to_string();
        snapshot.file_count = snapshot.source_files.len();
        stats.files_included = snapshot.file_count;

        if snapshot.import_counts.is_empty() {
            snapshot.observations.push(NO_IMPORTS_OBSERVATION.to_string());
        }

        info!(
            "Scanned {}: {} files, language {}, {} distinct imports, {} unreadable",
            snapshot.project_name,
            snapshot.file_count,
            snapshot.detected_language,
            snapshot.import_counts.len(),
            stats.failed_files()
        );

        ScanResult { snapshot, stats }
    }

    /// Scan several projects in parallel, reporting progress after each one.
    ///
    /// Results keep the order of `roots`; a failed project does not stop the others.
    pub fn scan_all(
        &self,
        roots: &[PathBuf],
        reporter: ProgressReporter,
    ) -> Vec<(PathBuf, Result<ScanResult>)> {
        let tracker = ProgressTracker::new(reporter, self.options.parallel_threads);
        tracker.track_parallel_progress(roots, |root| (root.clone(), self.scan(root)))
    }

    /// Like [`scan_all`](Self::scan_all), but each snapshot is written to
    /// `store` as soon as its scan finishes. Yields the written paths.
    pub fn scan_all_into(
        &self,
        roots: &[PathBuf],
        reporter: ProgressReporter,
        store: &SnapshotStore,
        timestamp: &str,
    ) -> Vec<(PathBuf, Result<PathBuf>)> {
        let tracker = ProgressTracker::new(reporter, self.options.parallel_threads);
        tracker.track_parallel_progress(roots, |root| {
            let written = self
                .scan(root)
                .and_then(|result| store.write(&result.snapshot, timestamp));
            (root.clone(), written)
        })
    }
}

fn read_record(file: &CollectedFile) -> std::result::Result<FileRecord, (ReadFailure, String)> {
    let bytes = fs::read(&file.path).map_err(|e| (ReadFailure::Io, e.to_string()))?;
    let source_code = String::from_utf8(bytes).map_err(|e| (ReadFailure::Decode, e.to_string()))?;
    let metadata = fs::metadata(&file.path).map_err(|e| (ReadFailure::Io, e.to_string()))?;

    let modified = metadata.modified().map_err(|e| (ReadFailure::Io, e.to_string()))?;
    let last_modified = to_local_seconds(DateTime::<Local>::from(modified).naive_local());

    Ok(FileRecord {
        file_name: file.file_name.clone(),
        full_path: file.path.clone(),
        relative_path: file.relative_path.clone(),
        size: metadata.len(),
        last_modified,
        lines: source_code.lines().count(),
        source_code,
    })
}

fn to_local_seconds(value: NaiveDateTime) -> NaiveDateTime {
    value.with_nanosecond(0).unwrap_or(value)
}
