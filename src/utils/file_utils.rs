use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;

/// Create a directory if it doesn't exist
pub fn ensure_dir_exists(dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    if !dir.exists() {
        debug!("Creating directory: {}", dir.display());
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }
    Ok(())
}

/// Lowercased extension of a file name, without the dot.
///
/// Dot-files such as `.gitignore` have no extension.
pub fn file_extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Base name of a path as an owned string, lossy for non UTF-8 names
pub fn base_name(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Write a string to a file, creating parent directories.
///
/// The content lands in a sibling `.partial` file first and is renamed into
/// place, so readers listing the directory never see half-written files.
pub fn write_string_atomically(path: impl AsRef<Path>, content: &str) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        ensure_dir_exists(parent)?;
    }

    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");

    fs::write(&partial, content)
        .with_context(|| format!("Failed to write file {}", Path::new(&partial).display()))?;
    fs::rename(&partial, path)
        .with_context(|| format!("Failed to move file into place at {}", path.display()))
}
