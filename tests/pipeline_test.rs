use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use pretty_assertions::assert_eq;
use tempfile::{TempDir, tempdir};

use footprint_scanner::config::Settings;
use footprint_scanner::pipeline::{self, PipelineContext, PipelineGate, RunId, scan_and_report};
use footprint_scanner::report;
use footprint_scanner::scanner::progress::progress_channel;
use footprint_scanner::source::{DataSource, LocalFolderSource};
use footprint_scanner::store::{Aggregator, LibraryUsage, SnapshotRejection, SnapshotStore};

fn write(root: &Path, relative: &str, content: &str) -> Result<()> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

/// A python project importing requests once and os twice, and a
/// javascript project importing lodash
fn two_projects() -> Result<TempDir> {
    let dir = tempdir()?;
    write(dir.path(), "alpha/app.py", "import requests\nimport os\n")?;
    write(dir.path(), "alpha/util/paths.py", "import os\n")?;
    write(dir.path(), "alpha/node_modules/junk/index.js", "require('left-pad')\n")?;
    write(dir.path(), "beta/index.js", "import _ from 'lodash';\n")?;
    write(dir.path(), "beta/logo.png", "not really a png")?;
    Ok(dir)
}

fn settings(work: &Path) -> Settings {
    Settings {
        scratch_dir: work.join("tmp"),
        reports_dir: work.join("reports"),
        checkout_dir: work.join("checkouts"),
        threads: Some(2),
        ..Settings::default()
    }
}

#[test]
fn test_local_run_end_to_end() -> Result<()> {
    let projects = two_projects()?;
    let work = tempdir()?;
    let ctx = PipelineContext::new(settings(work.path()));
    let run = RunId::with_timestamp("local_folder", "202401020304");

    let outcome = scan_and_report(projects.path(), &run, "unknown", &ctx)?;

    assert_eq!(outcome.projects, 2);
    assert_eq!(outcome.snapshots_written, 2);
    assert!(outcome.failed_projects.is_empty());
    assert_eq!(outcome.snapshot_dir, work.path().join("tmp").join("local_folder_202401020304"));
    assert_eq!(
        outcome.report_path,
        work.path().join("reports").join("report_local_folder_202401020304.json")
    );

    let report = report::read_json_report(&outcome.report_path)?;
    assert_eq!(report.subject_identifier, "unknown");

    let languages: Vec<_> = report
        .language_summaries
        .iter()
        .map(|s| (s.language.as_str(), s.file_count))
        .collect();
    assert_eq!(languages, vec![("python", 2), ("javascript", 1)]);

    assert_eq!(
        report.language_summaries[0].libraries,
        vec![LibraryUsage::new("os", 2), LibraryUsage::new("requests", 1)]
    );
    assert_eq!(report.language_summaries[1].libraries, vec![LibraryUsage::new("lodash", 1)]);

    let rendered = outcome.rendered_path.expect("markdown report");
    assert!(fs::read_to_string(rendered)?.contains("## Python (Files: 2)"));
    Ok(())
}

#[test]
fn test_runs_do_not_see_each_other() -> Result<()> {
    let projects = two_projects()?;
    let work = tempdir()?;
    let ctx = PipelineContext::new(settings(work.path()));

    let first = scan_and_report(projects.path(), &RunId::now("local_folder"), "unknown", &ctx)?;

    let only_gamma = tempdir()?;
    write(only_gamma.path(), "gamma/g.js", "import _ from 'lodash';\n")?;
    let second = scan_and_report(only_gamma.path(), &RunId::now("local_folder"), "unknown", &ctx)?;

    assert_ne!(first.snapshot_dir, second.snapshot_dir);
    assert_ne!(first.report_path, second.report_path);

    let report = report::read_json_report(&second.report_path)?;
    let languages: Vec<_> = report
        .language_summaries
        .iter()
        .map(|s| (s.language.as_str(), s.file_count))
        .collect();
    assert_eq!(languages, vec![("javascript", 1)]);

    let earlier = report::read_json_report(&first.report_path)?;
    assert_eq!(earlier.language_summaries.len(), 2);
    Ok(())
}

#[test]
fn test_same_timestamp_runs_are_sequenced() -> Result<()> {
    let projects = two_projects()?;
    let work = tempdir()?;
    let ctx = PipelineContext::new(settings(work.path()));
    let run = RunId::with_timestamp("local_folder", "202401020304");

    let first = scan_and_report(projects.path(), &run, "unknown", &ctx)?;
    let second = scan_and_report(projects.path(), &run, "unknown", &ctx)?;

    assert_eq!(first.run_id.sequence, 1);
    assert_eq!(second.run_id.sequence, 2);
    assert_eq!(
        second.snapshot_dir,
        work.path().join("tmp").join("local_folder_202401020304_2")
    );
    assert_eq!(
        second.report_path,
        work.path().join("reports").join("report_local_folder_202401020304_2.json")
    );
    assert!(second.snapshot_dir.join("alpha_snapshot_202401020304.json").is_file());

    let report = report::read_json_report(&second.report_path)?;
    assert_eq!(report.language("python").map(|s| s.file_count), Some(2));
    Ok(())
}

#[test]
fn test_malformed_snapshot_is_skipped() -> Result<()> {
    let projects = two_projects()?;
    let work = tempdir()?;
    let ctx = PipelineContext::new(settings(work.path()));
    let run = RunId::with_timestamp("local_folder", "202401020304");
    let outcome = scan_and_report(projects.path(), &run, "unknown", &ctx)?;

    fs::write(outcome.snapshot_dir.join("broken_snapshot_202401020304.json"), "{ not json")?;
    fs::write(
        outcome.snapshot_dir.join("partial_snapshot_202401020304.json"),
        r#"{"programming_language": "python"}"#,
    )?;

    let aggregated = Aggregator::new("octocat").aggregate_store(&SnapshotStore::new(&outcome.snapshot_dir))?;

    assert_eq!(aggregated.accepted.len(), 2);
    assert_eq!(aggregated.rejected.len(), 2);
    assert!(aggregated
        .rejected
        .iter()
        .any(|r| matches!(r.reason, SnapshotRejection::InvalidJson(_))));
    assert!(aggregated
        .rejected
        .iter()
        .any(|r| matches!(r.reason, SnapshotRejection::MissingField(_))));

    let python = aggregated.report.language("python").expect("python summary");
    assert_eq!(python.file_count, 2);
    Ok(())
}

#[tokio::test]
async fn test_run_all_isolates_failing_sources() -> Result<()> {
    let projects = two_projects()?;
    let work = tempdir()?;
    let (sender, mut receiver) = progress_channel();
    let ctx = Arc::new(PipelineContext::new(settings(work.path())).with_progress(sender));

    let sources: Vec<Arc<dyn DataSource>> = vec![
        Arc::new(LocalFolderSource::new(projects.path())),
        Arc::new(LocalFolderSource::new(work.path().join("missing"))),
    ];
    let outcomes = pipeline::run_all(sources, ctx, &PipelineGate::default()).await;

    assert_eq!(outcomes.len(), 2);
    let ok = outcomes[0].1.as_ref().expect("first pipeline succeeds");
    assert_eq!(ok.snapshots_written, 2);
    assert!(outcomes[1].1.is_err());

    let mut last = None;
    while let Ok(event) = receiver.try_recv() {
        assert_eq!(event.source, "local_folder");
        last = Some(event.percentage);
    }
    assert_eq!(last, Some(100));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_same_named_sources_keep_separate_runs() -> Result<()> {
    let first_root = two_projects()?;
    let second_root = tempdir()?;
    write(second_root.path(), "gamma/g.js", "import _ from 'lodash';\n")?;
    let work = tempdir()?;
    let ctx = Arc::new(PipelineContext::new(settings(work.path())));

    let sources: Vec<Arc<dyn DataSource>> = vec![
        Arc::new(LocalFolderSource::new(first_root.path())),
        Arc::new(LocalFolderSource::new(second_root.path())),
    ];
    let outcomes = pipeline::run_all(sources, ctx, &PipelineGate::default()).await;

    let first = outcomes[0].1.as_ref().expect("first pipeline succeeds");
    let second = outcomes[1].1.as_ref().expect("second pipeline succeeds");
    assert_ne!(first.snapshot_dir, second.snapshot_dir);
    assert_ne!(first.report_path, second.report_path);

    let mut totals = vec![
        report::read_json_report(&first.report_path)?.total_files(),
        report::read_json_report(&second.report_path)?.total_files(),
    ];
    totals.sort();
    assert_eq!(totals, vec![1, 3]);
    Ok(())
}
