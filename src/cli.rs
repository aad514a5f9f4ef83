// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `rendertrack`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "rendertrack",
    version,
    about = "Run render jobs and track their progress, remaining time and state.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `$RENDERTRACK_CONFIG`, else `Rendertrack.toml` in the current
    /// working directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Run jobs one after another (up to `max_concurrent` at a time),
    /// overriding `[supervisor].queue_mode`.
    #[arg(long)]
    pub queue_renders: bool,

    /// Run only these jobs (repeatable). Default: every job in the config.
    #[arg(long = "job", value_name = "NAME")]
    pub jobs: Vec<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RENDERTRACK_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the jobs, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
