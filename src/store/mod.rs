pub mod aggregator;
pub mod storage;
pub mod types;

// Re-export main types and functions for easier access
pub use aggregator::{Aggregator, ReportBuilder};
pub use storage::{SNAPSHOT_MARKER, SnapshotStore};
pub use types::{
    AggregateReport, AggregationOutcome, LanguageSummary, LibraryUsage, RejectedSnapshot,
    SnapshotRejection, UNKNOWN_SUBJECT,
};
