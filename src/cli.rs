// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Default copy-set extensions (case-insensitive), per §6: image, subtitle,
/// and metadata suffixes.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "srt", "ass", "ssa", "sub", "vtt", "nfo", "xml",
    "json",
];

/// Standalone reconciler + watcher CLI: `mirrorsync input_dir output_dir ...`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "mirrorsync",
    version,
    about = "Mirror a source tree: copy configured extensions by value, symlink everything else.",
    long_about = None
)]
pub struct CliArgs {
    /// Source directory to mirror from.
    pub input_dir: String,

    /// Destination directory to mirror into (created if missing).
    pub output_dir: String,

    /// Comma-separated list of extensions to copy by value (case-insensitive,
    /// no leading dot). Files with any other extension are symlinked.
    #[arg(long, value_name = "CSV")]
    pub extensions: Option<String>,

    /// Verbose logging (shorthand for `--log-level debug`).
    #[arg(long)]
    pub verbose: bool,

    /// Batch Queue drain threshold (§4.4).
    #[arg(long, value_name = "N", default_value_t = 100)]
    pub batch_size: usize,

    /// Batch Queue drain interval, in seconds (§4.4).
    #[arg(long, value_name = "S", default_value_t = 1.0)]
    pub batch_interval: f64,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `MIRRORSYNC_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Reconcile once and exit, without starting the live watch loop.
    #[arg(long)]
    pub once: bool,
}

impl CliArgs {
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.log_level.is_some() {
            self.log_level
        } else if self.verbose {
            Some(LogLevel::Debug)
        } else {
            None
        }
    }

    /// Parse `--extensions` into a lowercased set, falling back to
    /// [`DEFAULT_EXTENSIONS`].
    pub fn extension_set(&self) -> std::collections::HashSet<String> {
        match &self.extensions {
            Some(csv) => csv
                .split(',')
                .map(|s| s.trim().trim_start_matches('.').to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Daemon binary: task supervisor + HTTP/JSON admin surface (§6, §4.7).
#[derive(Debug, Clone, Parser)]
#[command(
    name = "mirrorsyncd",
    version,
    about = "Run the mirrorsync task supervisor and admin API.",
    long_about = None
)]
pub struct DaemonArgs {
    /// Root directory holding the task registry, hash cache, and logs
    /// (`<root>/tasks.json`, `<root>/.db/file_cache.db`, `<root>/logs/`).
    #[arg(long, value_name = "PATH", default_value = ".")]
    pub state_dir: String,

    /// Address the admin HTTP API binds to.
    #[arg(long, value_name = "ADDR", default_value = "127.0.0.1:8080")]
    pub bind: String,

    /// Logging level (error, warn, info, debug, trace).
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse_sync() -> CliArgs {
    CliArgs::parse()
}

pub fn parse_daemon() -> DaemonArgs {
    DaemonArgs::parse()
}
