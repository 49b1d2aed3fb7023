use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use log::{debug, trace, warn};
use walkdir::{DirEntry, WalkDir};

use super::classifier::{Classification, FileClassifier};

/// A file the classifier admitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedFile {
    pub path: PathBuf,
    pub relative_path: PathBuf,
    pub file_name: String,
    pub classification: Classification,
}

/// Everything one walk over a project produced
#[derive(Debug, Default, Clone)]
pub struct Collection {
    /// Admitted files in discovery order
    pub files: Vec<CollectedFile>,
    pub files_visited: usize,
    pub files_skipped: usize,
    pub pruned_dirs: usize,
    pub walk_error_paths: Vec<PathBuf>,
}

/// Walks a project tree top-down and applies the file classifier
#[derive(Debug, Clone, Default)]
pub struct FileCollector {
    classifier: FileClassifier,
    follow_links: bool,
    verbose: bool,
}

impl FileCollector {
    pub fn new(classifier: FileClassifier) -> Self {
        Self {
            classifier,
            follow_links: false,
            verbose: false,
        }
    }

    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn classifier(&self) -> &FileClassifier {
        &self.classifier
    }

    /// Collect every admitted file below `root`.
    ///
    /// Within a directory, files come before subdirectories and both are
    /// ordered by name, so discovery order is stable between runs. Excluded
    /// directories are pruned before the walker enters them.
    pub fn collect_files(&self, root: impl AsRef<Path>) -> Collection {
        let root = root.as_ref();
        debug!("Collecting files from directory: {}", root.display());

        let mut collection = Collection::default();
        let mut pruned_dirs = 0usize;

        let walker = WalkDir::new(root)
            .follow_links(self.follow_links)
            .sort_by(files_first)
            .into_iter()
            .filter_entry(|entry| {
                let pruned = self.is_pruned(entry);
                if pruned {
                    trace!("Pruning directory: {}", entry.path().display());
                    pruned_dirs += 1;
                }
                !pruned
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                    warn!("Cannot access {}: {}", path.display(), e);
                    collection.walk_error_paths.push(path);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            collection.files_visited += 1;

            let path = entry.path();
            let relative_path = path.strip_prefix(root).unwrap_or(path).to_path_buf();
            let file_name = entry.file_name().to_string_lossy().into_owned();

            let classification = self.classifier.classify(&relative_path, &file_name);
            if !classification.is_included() {
                if self.verbose {
                    debug!("Skipping file {}", path.display());
                }
                collection.files_skipped += 1;
                continue;
            }

            trace!("Found file: {}", path.display());
            collection.files.push(CollectedFile {
                path: path.to_path_buf(),
                relative_path,
                file_name,
                classification,
            });
        }

        collection.pruned_dirs = pruned_dirs;
        debug!(
            "Collected {} of {} files from {} ({} directories pruned)",
            collection.files.len(),
            collection.files_visited,
            root.display(),
            collection.pruned_dirs
        );
        collection
    }

    fn is_pruned(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.classifier.is_excluded_dir(name))
    }
}

fn files_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn collector() -> FileCollector {
        FileCollector::new(FileClassifier::new(ClassifierConfig::default()))
    }

    #[test]
    fn test_prunes_excluded_directories() -> Result<()> {
        let dir = tempdir()?;
        let root = dir.path();
        fs::create_dir_all(root.join("node_modules/lodash"))?;
        fs::create_dir_all(root.join("src"))?;
        fs::write(root.join("node_modules/lodash/index.js"), "module.exports = {}")?;
        fs::write(root.join("src/app.js"), "const _ = require('lodash')")?;

        let collection = collector().collect_files(root);

        let names: Vec<_> = collection.files.iter().map(|f| f.relative_path.clone()).collect();
        assert_eq!(names, vec![PathBuf::from("src/app.js")]);
        assert_eq!(collection.pruned_dirs, 1);
        assert_eq!(collection.files_visited, 1);
        Ok(())
    }

    #[test]
    fn test_files_before_subdirectories() -> Result<()> {
        let dir = tempdir()?;
        let root = dir.path();
        fs::create_dir_all(root.join("a_dir"))?;
        fs::write(root.join("a_dir/inner.py"), "")?;
        fs::write(root.join("z.py"), "")?;
        fs::write(root.join("b.py"), "")?;

        let collection = collector().collect_files(root);

        let names: Vec<_> = collection.files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["b.py", "z.py", "inner.py"]);
        Ok(())
    }

    #[test]
    fn test_root_named_like_excluded_folder_is_scanned() -> Result<()> {
        let dir = tempdir()?;
        let root = dir.path().join("build");
        fs::create_dir_all(&root)?;
        fs::write(root.join("main.go"), "package main")?;

        let collection = collector().collect_files(&root);
        assert_eq!(collection.files.len(), 1);
        Ok(())
    }

    #[test]
    fn test_counts_skipped_files() -> Result<()> {
        let dir = tempdir()?;
        let root = dir.path();
        fs::write(root.join("logo.png"), [0u8, 1, 2])?;
        fs::write(root.join("yarn.lock"), "")?;
        fs::write(root.join("package.json"), "{}")?;

        let collection = collector().collect_files(root);
        assert_eq!(collection.files_visited, 3);
        assert_eq!(collection.files_skipped, 2);
        assert_eq!(collection.files[0].classification, Classification::IncludeKeyFile);
        Ok(())
    }
}
