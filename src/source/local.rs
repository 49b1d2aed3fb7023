use std::path::{Path, PathBuf};

use anyhow::bail;
use log::info;

use super::{DataSource, FetchFuture, FetchOutcome};

/// Projects already on disk; fetching only checks the folder exists
#[derive(Debug, Clone)]
pub struct LocalFolderSource {
    path: PathBuf,
}

impl LocalFolderSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSource for LocalFolderSource {
    fn name(&self) -> &str {
        "local_folder"
    }

    fn fetch_into<'a>(&'a self, _scratch_dir: &'a Path) -> FetchFuture<'a> {
        Box::pin(async move {
            if !self.path.is_dir() {
                bail!("Local folder {} does not exist", self.path.display());
            }
            info!("Using local folder: {}", self.path.display());
            Ok(FetchOutcome {
                projects_root: self.path.clone(),
                repositories: 0,
                failed: Vec::new(),
            })
        })
    }
}
