// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `procsched`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "procsched",
    version,
    about = "Run a pipeline of processes under a pluggable schedule.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the pipeline file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Pipeline.toml")]
    pub pipeline: String,

    /// Schedule to run the pipeline with. Overrides `[schedule].type`.
    #[arg(long, value_name = "NAME")]
    pub schedule: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCSCHED_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the pipeline, but don't run it.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the assembled pipeline as Graphviz dot and exit.
    #[arg(long)]
    pub dot: bool,

    /// List the registered schedules and exit.
    #[arg(long)]
    pub list_schedules: bool,
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

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
