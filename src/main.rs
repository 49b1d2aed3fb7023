use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use log::{error, info, warn};

use footprint_scanner::config::Settings;
use footprint_scanner::logging::{self, LogTarget};
use footprint_scanner::pipeline::{self, PipelineContext, PipelineGate, RunId};
use footprint_scanner::report::{self, MarkdownRenderer, ReportRenderer};
use footprint_scanner::scanner::progress::{draw_progress, progress_channel};
use footprint_scanner::scanner::{ProjectScanner, ScanOptions};
use footprint_scanner::source::{DataSource, LocalFolderSource, RemoteHost, RemoteHostSource};
use footprint_scanner::store::{Aggregator, SnapshotStore};

#[derive(Parser)]
#[command(name = "footprint")]
#[command(about = "Inventory the languages and libraries used across codebases")]
#[command(version)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// log4rs YAML configuration, overrides --log-file
    #[arg(long, global = true)]
    log_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, scan and report on one or more data sources concurrently
    Scan(ScanArgs),
    /// Scan a single project and write its snapshot
    Snapshot {
        /// Project directory
        project: PathBuf,
        /// Snapshot file to write (defaults to the scratch directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Settings file (TOML or YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Aggregate an existing directory of snapshots
    Aggregate {
        /// Directory holding `*_snapshot_*.json` files
        #[arg(long)]
        snapshots: PathBuf,
        /// Account the report is for
        #[arg(long)]
        subject: Option<String>,
        /// JSON report to write (defaults to the reports directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Settings file (TOML or YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ScanArgs {
    /// Local folder whose subdirectories are projects
    #[arg(long)]
    local: Option<PathBuf>,

    /// GitHub usernames
    #[arg(long, num_args = 1..)]
    github: Vec<String>,

    /// GitLab usernames
    #[arg(long, num_args = 1..)]
    gitlab: Vec<String>,

    /// API token for the remote hosts
    #[arg(long)]
    token: Option<String>,

    /// Settings file (TOML or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where remote repositories are cloned
    #[arg(long)]
    checkout_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let target = match (&cli.log_config, &cli.log_file) {
        (Some(config), _) => LogTarget::ConfigFile(config.clone()),
        (None, Some(file)) => LogTarget::File(file.clone()),
        (None, None) => LogTarget::Console,
    };
    if let Err(e) = logging::init(&target, cli.verbose) {
        eprintln!("Error: {e:#}");
        process::exit(2);
    }

    let result = match cli.command {
        Commands::Scan(args) => cmd_scan(args).await,
        Commands::Snapshot { project, out, config } => cmd_snapshot(&project, out, config.as_deref()),
        Commands::Aggregate { snapshots, subject, out, config } => {
            cmd_aggregate(&snapshots, subject, out, config.as_deref())
        }
    };

    if let Err(e) = result {
        error!("{e:#}");
        eprintln!("Error: {e:#}");
        process::exit(2);
    }
}

fn load_settings(config: Option<&Path>) -> Result<Settings> {
    match config {
        Some(path) => Settings::load(path),
        None => Ok(Settings::default()),
    }
}

async fn cmd_scan(args: ScanArgs) -> Result<()> {
    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(dir) = args.checkout_dir {
        settings.checkout_dir = dir;
    }

    let mut sources: Vec<Arc<dyn DataSource>> = Vec::new();
    if let Some(path) = args.local {
        sources.push(Arc::new(LocalFolderSource::new(path)));
    }
    if !args.github.is_empty() {
        sources.push(Arc::new(
            RemoteHostSource::new(RemoteHost::GitHub, args.github).with_token(args.token.clone()),
        ));
    }
    if !args.gitlab.is_empty() {
        sources.push(Arc::new(
            RemoteHostSource::new(RemoteHost::GitLab, args.gitlab).with_token(args.token),
        ));
    }
    if sources.is_empty() {
        bail!("Nothing to scan: pass --local, --github or --gitlab");
    }

    let (sender, receiver) = progress_channel();
    let names = sources.iter().map(|s| s.name().to_string()).collect();
    let drawer = tokio::spawn(draw_progress(receiver, names));

    let ctx = Arc::new(PipelineContext::new(settings).with_progress(sender));
    let gate = PipelineGate::default();
    let outcomes = pipeline::run_all(sources, ctx, &gate).await;

    // Every sender is dropped with the context, which ends the progress display
    if let Err(e) = drawer.await {
        warn!("Progress display stopped early: {}", e);
    }

    let mut failures = 0;
    for (source, outcome) in &outcomes {
        match outcome {
            Ok(outcome) => {
                println!(
                    "{}: {} projects, {} snapshots, report {}",
                    source,
                    outcome.projects,
                    outcome.snapshots_written,
                    outcome.report_path.display()
                );
                if let Some(rendered) = &outcome.rendered_path {
                    println!("{}: rendered {}", source, rendered.display());
                }
            }
            Err(e) => {
                failures += 1;
                println!("{source}: failed: {e:#}");
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} pipelines failed", failures, outcomes.len());
    }
    Ok(())
}

fn cmd_snapshot(project: &Path, out: Option<PathBuf>, config: Option<&Path>) -> Result<()> {
    let settings = load_settings(config)?;
    let options = ScanOptions {
        classifier: settings.classifier_config(),
        parallel_threads: settings.threads,
        ..ScanOptions::default()
    };
    let result = ProjectScanner::new(options).scan(project)?;
    let mut run = RunId::now("local_folder");

    let path = match out {
        Some(path) => {
            let content = serde_json::to_string_pretty(&result.snapshot)
                .context("Failed to serialize snapshot")?;
            footprint_scanner::file_utils::write_string_atomically(&path, &content)?;
            path
        }
        None => run
            .claim(&settings.scratch_dir)?
            .write(&result.snapshot, &run.timestamp)?,
    };

    info!("Snapshot written to {}", path.display());
    println!(
        "{}: {} files, language {}, snapshot {}",
        result.snapshot.project_name,
        result.snapshot.file_count,
        result.snapshot.detected_language,
        path.display()
    );
    Ok(())
}

fn cmd_aggregate(
    snapshots: &Path,
    subject: Option<String>,
    out: Option<PathBuf>,
    config: Option<&Path>,
) -> Result<()> {
    let settings = load_settings(config)?;
    if !snapshots.is_dir() {
        bail!("Snapshot directory {} does not exist", snapshots.display());
    }

    let aggregator = match subject {
        Some(subject) => Aggregator::new(subject),
        None => Aggregator::default(),
    };
    let outcome = aggregator.aggregate_store(&SnapshotStore::new(snapshots))?;
    for rejected in &outcome.rejected {
        println!("skipped {}: {}", rejected.path.display(), rejected.reason);
    }

    let out = match out {
        Some(path) => path,
        None => RunId::now("aggregate").free_report_path(&settings.reports_dir),
    };
    report::write_json_report(&outcome.report, &out)?;

    let renderer = MarkdownRenderer::default();
    let rendered = report::rendered_path(&out, &renderer);
    if let Err(e) = renderer.render(&outcome.report, &rendered) {
        error!("Failed to render report {}: {:#}", rendered.display(), e);
    }

    println!(
        "{} snapshots aggregated into {} ({} languages)",
        outcome.accepted.len(),
        out.display(),
        outcome.report.language_summaries.len()
    );
    Ok(())
}
