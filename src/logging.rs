//! Logger setup for the command line tool.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

/// `<timestamp> - <level> - <message>`
pub const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} - {l} - {m}{n}";

/// Where log records go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// stderr through env_logger; `RUST_LOG` still wins when set
    Console,
    /// Append to a file, echoing to stderr
    File(PathBuf),
    /// A complete log4rs YAML configuration
    ConfigFile(PathBuf),
}

pub fn default_level(verbose: bool) -> LevelFilter {
    if verbose { LevelFilter::Debug } else { LevelFilter::Info }
}

/// Install the global logger. Can only succeed once per process.
pub fn init(target: &LogTarget, verbose: bool) -> Result<()> {
    let level = default_level(verbose);
    match target {
        LogTarget::Console => {
            env_logger::Builder::new()
                .filter_level(level)
                .parse_default_env()
                .format_timestamp_secs()
                .try_init()
                .context("Logger already initialized")?;
        }
        LogTarget::File(path) => {
            let config = file_config(path, level)?;
            log4rs::init_config(config).context("Logger already initialized")?;
        }
        LogTarget::ConfigFile(path) => {
            log4rs::init_file(path, Default::default())
                .with_context(|| format!("Failed to load log configuration {}", path.display()))?;
        }
    }
    Ok(())
}

fn file_config(path: &Path, level: LevelFilter) -> Result<Config> {
    let file = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .target(log4rs::append::console::Target::Stderr)
        .build();

    Config::builder()
        .appender(Appender::builder().build("file", Box::new(file)))
        .appender(Appender::builder().build("console", Box::new(console)))
        .build(Root::builder().appender("file").appender("console").build(level))
        .context("Invalid log configuration")
}
