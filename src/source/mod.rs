//! Providers of projects to scan.

pub mod local;
pub mod remote;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use anyhow::Result;

pub use local::LocalFolderSource;
pub use remote::{RemoteHost, RemoteHostSource};

/// Future returned by [`DataSource::fetch_into`]; boxed so sources can live behind `dyn`
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<FetchOutcome>> + Send + 'a>>;

/// What a fetch produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Directory whose subdirectories are the projects
    pub projects_root: PathBuf,

    /// Repositories the source knew about
    pub repositories: usize,

    /// Repositories that could not be cloned or updated
    pub failed: Vec<String>,
}

/// A provider of project directories.
///
/// Fetching is the only capability that differs between sources; scanning
/// and reporting are shared by [`crate::pipeline::run_pipeline`].
pub trait DataSource: Send + Sync {
    /// Short name used in run directories and report names
    fn name(&self) -> &str;

    /// Account the report is for
    fn subject(&self) -> String {
        crate::store::UNKNOWN_SUBJECT.to_string()
    }

    /// Populate `scratch_dir` (or point elsewhere) with one directory per project.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing usable could be fetched.
    fn fetch_into<'a>(&'a self, scratch_dir: &'a Path) -> FetchFuture<'a>;
}
