// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::CaptureMode;

/// Command-line arguments for `proctask`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "proctask",
    version,
    about = "Run one program and reconcile its exit status.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to a task file (TOML).
    ///
    /// A program given after `--` replaces the file's `path` and `args`.
    /// Without either, `Proctask.toml` in the current directory is used.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Exit code to accept as success (repeatable). Default: 0.
    #[arg(long = "accept", value_name = "CODE", allow_negative_numbers = true)]
    pub accept: Vec<i32>,

    /// Send SIGTERM if the program is still running after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Capture stdout / stderr and print them once the program finished.
    ///
    /// MODE (bytes, text, json) applies to stdout; stderr is always text.
    #[arg(
        long,
        value_name = "MODE",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "text"
    )]
    pub capture: Option<CaptureMode>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCTASK_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Program to run, followed by its arguments.
    #[arg(last = true, value_name = "PROGRAM")]
    pub command: Vec<String>,
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
