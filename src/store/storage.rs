use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::scanner::ProjectSnapshot;
use crate::utils::file_utils;

/// Marker every snapshot file name contains
pub const SNAPSHOT_MARKER: &str = "_snapshot_";

/// Snapshot files of one directory on disk
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    /// Directory holding the snapshot files
    dir: PathBuf,
}

impl SnapshotStore {
    /// A store over an arbitrary directory
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// The store of one run: `<scratch_root>/<run_dir_name>`
    pub fn for_run(scratch_root: impl AsRef<Path>, run_dir_name: &str) -> Self {
        Self::new(scratch_root.as_ref().join(run_dir_name))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<project_name>_snapshot_<timestamp>.json`
    pub fn file_name(project_name: &str, timestamp: &str) -> String {
        format!("{project_name}{SNAPSHOT_MARKER}{timestamp}.json")
    }

    /// Whether a file name follows the snapshot naming convention
    pub fn is_snapshot_file_name(name: &str) -> bool {
        name.contains(SNAPSHOT_MARKER) && name.ends_with(".json")
    }

    /// Write a snapshot; the file appears in listings only once complete
    pub fn write(&self, snapshot: &ProjectSnapshot, timestamp: &str) -> Result<PathBuf> {
        let path = self.dir.join(Self::file_name(&snapshot.project_name, timestamp));
        debug!("Saving snapshot to {}", path.display());

        let content = serde_json::to_string_pretty(snapshot)
            .with_context(|| format!("Failed to serialize snapshot of {}", snapshot.project_name))?;
        file_utils::write_string_atomically(&path, &content)?;

        info!("Generated snapshot for project {} at {}", snapshot.project_name, path.display());
        Ok(path)
    }

    /// Read one snapshot file
    pub fn read(path: impl AsRef<Path>) -> Result<ProjectSnapshot> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse snapshot file {}", path.display()))
    }

    /// Snapshot files directly in this directory, sorted by name.
    ///
    /// The listing is taken once; entries that vanish while it is built are
    /// ignored. A missing directory lists as empty.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            debug!("Snapshot directory {} does not exist", self.dir.display());
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list snapshot directory {}", self.dir.display()))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", self.dir.display(), e);
                    continue;
                }
            };

            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !Self::is_snapshot_file_name(name) {
                continue;
            }
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                files.push(entry.path());
            }
        }

        files.sort();
        debug!("Found {} snapshot files in {}", files.len(), self.dir.display());
        Ok(files)
    }
}
