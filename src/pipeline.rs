//! fetch → scan → snapshot → aggregate → render, once per data source.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use futures::future::join_all;
use log::{debug, error, info, warn};

use crate::config::Settings;
use crate::report::{self, MarkdownRenderer, ReportRenderer};
use crate::scanner::progress::ProgressSender;
use crate::scanner::{FileClassifier, ProgressReporter, ProjectScanner, ScanOptions};
use crate::source::DataSource;
use crate::store::{Aggregator, RejectedSnapshot, SnapshotStore};
use crate::utils::file_utils;

/// Identity of one run: the data source, the minute it started and a
/// sequence number separating runs that start in the same minute
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId {
    pub source: String,
    /// `YYYYMMDDHHmm`
    pub timestamp: String,
    /// 1 for the first run of a source in a given minute
    pub sequence: u32,
}

impl RunId {
    pub fn new(source: impl Into<String>, started: DateTime<Local>) -> Self {
        Self::with_timestamp(source, started.format("%Y%m%d%H%M").to_string())
    }

    pub fn now(source: impl Into<String>) -> Self {
        Self::new(source, Local::now())
    }

    pub fn with_timestamp(source: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            timestamp: timestamp.into(),
            sequence: 1,
        }
    }

    /// `<timestamp>`, or `<timestamp>_<sequence>` after the first run of the minute
    pub fn stamp(&self) -> String {
        match self.sequence {
            0 | 1 => self.timestamp.clone(),
            n => format!("{}_{}", self.timestamp, n),
        }
    }

    /// Directory under the scratch root holding this run's snapshots
    pub fn dir_name(&self) -> String {
        format!("{}_{}", self.source, self.stamp())
    }

    /// `<reports_dir>/report_<source>_<stamp>.json`, bumping the sequence
    /// past reports that already exist
    pub fn free_report_path(&mut self, reports_dir: impl AsRef<Path>) -> PathBuf {
        let reports_dir = reports_dir.as_ref();
        loop {
            let path = reports_dir.join(report::report_file_name(&self.source, &self.stamp()));
            if !path.exists() {
                return path;
            }
            self.sequence = self.sequence.max(1) + 1;
        }
    }

    /// Create this run's snapshot directory under `scratch_root`.
    ///
    /// Creation is exclusive: when the directory already exists another run
    /// owns it and the sequence is bumped until a fresh one is created.
    pub fn claim(&mut self, scratch_root: impl AsRef<Path>) -> Result<SnapshotStore> {
        let scratch_root = scratch_root.as_ref();
        file_utils::ensure_dir_exists(scratch_root)?;

        loop {
            let dir = scratch_root.join(self.dir_name());
            match fs::create_dir(&dir) {
                Ok(()) => {
                    debug!("Claimed run directory {}", dir.display());
                    return Ok(SnapshotStore::new(dir));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!("Run directory {} is taken", dir.display());
                    self.sequence = self.sequence.max(1) + 1;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to create run directory {}", dir.display()));
                }
            }
        }
    }
}

/// Shared, read-only context every pipeline runs with
#[derive(Clone)]
pub struct PipelineContext {
    pub settings: Settings,
    pub renderer: Arc<dyn ReportRenderer>,
    pub progress: Option<ProgressSender>,
}

impl PipelineContext {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            renderer: Arc::new(MarkdownRenderer::default()),
            progress: None,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn ReportRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_progress(mut self, sender: ProgressSender) -> Self {
        self.progress = Some(sender);
        self
    }

    fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            classifier: self.settings.classifier_config(),
            parallel_threads: self.settings.threads,
            ..ScanOptions::default()
        }
    }

    fn reporter(&self, source: &str) -> ProgressReporter {
        match &self.progress {
            Some(sender) => ProgressReporter::new(source, sender.clone()),
            None => ProgressReporter::silent(source),
        }
    }
}

/// What one pipeline run produced
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub run_id: RunId,
    pub projects: usize,
    pub snapshot_dir: PathBuf,
    pub snapshots_written: usize,
    /// Projects whose scan or snapshot write failed
    pub failed_projects: Vec<PathBuf>,
    pub rejected_snapshots: Vec<RejectedSnapshot>,
    pub report_path: PathBuf,
    /// `None` when rendering failed; the JSON report is still valid
    pub rendered_path: Option<PathBuf>,
}

/// Start/stop toggle: a stopped gate keeps new pipelines from starting but
/// never interrupts running ones
#[derive(Debug)]
pub struct PipelineGate {
    open: AtomicBool,
}

impl Default for PipelineGate {
    fn default() -> Self {
        Self {
            open: AtomicBool::new(true),
        }
    }
}

impl PipelineGate {
    pub fn start(&self) {
        self.open.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    /// Flip the gate, returning whether it is now open
    pub fn toggle(&self) -> bool {
        !self.open.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Top-level project directories under `root`, sorted by name.
///
/// Excluded folder names are skipped. A root without subdirectories is
/// itself the only project.
pub fn discover_projects(root: impl AsRef<Path>, classifier: &FileClassifier) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    let entries = fs::read_dir(root)
        .with_context(|| format!("Failed to list projects in {}", root.display()))?;

    let mut projects = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name();
        if name.to_str().is_some_and(|n| classifier.is_excluded_dir(n)) {
            continue;
        }
        projects.push(entry.path());
    }

    if projects.is_empty() {
        projects.push(root.to_path_buf());
    }
    projects.sort();
    Ok(projects)
}

/// Scan every project under `projects_root`, write the run's snapshots,
/// aggregate them and write the reports.
///
/// The run claims a fresh snapshot directory first, so the outcome's
/// [`RunId`] may carry a higher sequence than `run_id` when another run of
/// the same source started in the same minute.
///
/// Per-project failures are logged and listed in the outcome. Failing to
/// write the JSON report is an error; failing to render it is not.
pub fn scan_and_report(
    projects_root: &Path,
    run_id: &RunId,
    subject: &str,
    ctx: &PipelineContext,
) -> Result<PipelineOutcome> {
    let options = ctx.scan_options();
    let projects = discover_projects(projects_root, &FileClassifier::new(options.classifier.clone()))?;
    info!("Total projects found for data source '{}': {}", run_id.source, projects.len());

    let mut run_id = run_id.clone();
    let store = run_id.claim(&ctx.settings.scratch_dir)?;
    let scanner = ProjectScanner::new(options);
    let reporter = ctx.reporter(&run_id.source);

    let results = scanner.scan_all_into(&projects, reporter, &store, &run_id.timestamp);

    let mut failed_projects = Vec::new();
    let mut snapshots_written = 0;
    for (project, result) in results {
        match result {
            Ok(_) => snapshots_written += 1,
            Err(e) => {
                error!("Failed to generate snapshot for project {}: {:#}", project.display(), e);
                failed_projects.push(project);
            }
        }
    }

    let outcome = Aggregator::new(subject).aggregate_store(&store)?;

    let report_path = ctx
        .settings
        .reports_dir
        .join(report::report_file_name(&run_id.source, &run_id.stamp()));
    if let Err(e) = report::write_json_report(&outcome.report, &report_path) {
        error!("Failed to write overall report {}: {:#}", report_path.display(), e);
        return Err(e);
    }

    let rendered = report::rendered_path(&report_path, ctx.renderer.as_ref());
    let rendered_path = match ctx.renderer.render(&outcome.report, &rendered) {
        Ok(()) => Some(rendered),
        Err(e) => {
            error!("Failed to render report {}: {:#}", rendered.display(), e);
            None
        }
    };

    Ok(PipelineOutcome {
        run_id,
        projects: projects.len(),
        snapshot_dir: store.dir().to_path_buf(),
        snapshots_written,
        failed_projects,
        rejected_snapshots: outcome.rejected,
        report_path,
        rendered_path,
    })
}

/// Run one data source end to end
pub async fn run_pipeline(source: Arc<dyn DataSource>, ctx: Arc<PipelineContext>) -> Result<PipelineOutcome> {
    let run_id = RunId::now(source.name());
    info!("Starting pipeline for {} at {}", run_id.source, run_id.timestamp);

    let checkout_dir = ctx.settings.checkout_dir.join(source.name());
    let fetched = source
        .fetch_into(&checkout_dir)
        .await
        .with_context(|| format!("Failed to fetch {} data", source.name()))?;
    if !fetched.failed.is_empty() {
        warn!("{} repositories could not be fetched for {}", fetched.failed.len(), source.name());
    }

    let subject = source.subject();
    tokio::task::spawn_blocking(move || scan_and_report(&fetched.projects_root, &run_id, &subject, &ctx))
        .await
        .context("Scan task panicked")?
}

/// Run every source as its own concurrent pipeline.
///
/// Sources are skipped while the gate is stopped. A failing pipeline only
/// produces an `Err` entry for its own source.
pub async fn run_all(
    sources: Vec<Arc<dyn DataSource>>,
    ctx: Arc<PipelineContext>,
    gate: &PipelineGate,
) -> Vec<(String, Result<PipelineOutcome>)> {
    let mut handles = Vec::new();
    for source in sources {
        let name = source.name().to_string();
        if !gate.is_open() {
            warn!("Pipelines are stopped, not starting {}", name);
            continue;
        }
        let ctx = Arc::clone(&ctx);
        handles.push(async move {
            let result = match tokio::spawn(run_pipeline(source, ctx)).await {
                Ok(result) => result,
                Err(e) => Err(anyhow::anyhow!("Pipeline task failed: {e}")),
            };
            if let Err(e) = &result {
                error!("Pipeline {} failed: {:#}", name, e);
            }
            (name, result)
        });
    }
    join_all(handles).await
}
