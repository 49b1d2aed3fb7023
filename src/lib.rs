pub mod config;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod scanner;
pub mod source;
pub mod store;
pub mod utils;

// Re-export main types and functions for easier access
pub use config::{ClassifierConfig, ClassifierOverrides, Settings};
pub use scanner::{
    Classification, FileClassifier, ImportExtractor, ImportHeuristic, ProjectScanner,
    ProjectSnapshot, ScanOptions, ScanResult,
};
pub use store::{AggregateReport, Aggregator, LanguageSummary, LibraryUsage, SnapshotStore};
pub use pipeline::{PipelineContext, PipelineGate, PipelineOutcome, RunId, run_all, run_pipeline};
pub use report::{MarkdownRenderer, ReportRenderer};
pub use source::{DataSource, LocalFolderSource, RemoteHost, RemoteHostSource};

// Re-export utility functions
pub use utils::file_utils;
