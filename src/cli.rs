// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `depflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "depflow",
    version,
    about = "Process modules in dependency order, optionally in parallel.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the module manifest (TOML).
    ///
    /// Defaults to `Depflow.toml` in the current directory.
    #[arg(long, value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// Process only the modules reachable from this module (repeatable).
    ///
    /// Defaults to every module in the manifest.
    #[arg(long, value_name = "ID")]
    pub root: Vec<String>,

    /// Number of worker threads; overrides `[settings].workers`.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub workers: Option<u32>,

    /// Process modules one at a time on the main thread.
    #[arg(long, conflicts_with = "workers")]
    pub sequential: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DEPFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load the manifest, check for cycles and print a processing order
    /// without running any command.
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

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
