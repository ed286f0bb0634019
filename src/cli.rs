//! 命令行参数

use crate::config::SyncConfig;
use crate::logging::LogConfig;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// One-way synchronization of regular files from a source directory into a destination directory
#[derive(Debug, Parser)]
#[command(name = "filesync", author, version, about, long_about = None)]
pub struct Cli {
    /// Source directory (must exist)
    pub source: PathBuf,

    /// Destination directory (created if missing)
    pub destination: PathBuf,

    /// Skip source files whose name matches PATTERN (`*` and `?` wildcards, case-insensitive)
    #[arg(long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Print a JSON summary of the run after completion
    #[arg(long)]
    pub json: bool,

    /// Increase diagnostic output on stderr (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only report errors on stderr
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Also write diagnostics to a size-rotated log file in DIR
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Rotate the log file once it grows past this many megabytes
    #[arg(long, value_name = "MB", default_value_t = 5)]
    pub log_max_size_mb: u32,
}

impl Cli {
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig::new(&self.source, &self.destination).with_excludes(self.exclude.clone())
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            log_dir: self.log_dir.clone(),
            max_size_mb: self.log_max_size_mb,
            ..LogConfig::from_verbosity(self.verbose, self.quiet)
        }
    }
}
