// src/lib.rs

//! Asynchronous lifecycle management for a single subprocess.
//!
//! [`Task::start`] attaches the configured standard streams, launches the
//! program, and chains a one-time teardown onto the process's exit:
//! terminate if still running, check the exit code against the acceptable
//! set, release every stream, then resolve [`Task::completed`].

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod stream;
pub mod task;
pub mod types;

use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{default_config_path, load_from_path, RawTaskConfiguration};
use crate::exec::signal;
use crate::stream::StreamSpec;
use crate::types::{CaptureMode, StreamContent};

pub use crate::config::TaskConfiguration;
pub use crate::errors::{ProctaskError, TaskFailure};
pub use crate::task::{Task, TaskOutcome};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (task file and/or command line)
/// - the task itself
/// - Ctrl-C forwarding (as SIGINT) and the optional timeout (as SIGTERM)
///
/// Returns the exit code for the `proctask` process: 0 on success, the
/// child's status code on a status failure, 1 for any other failure.
pub async fn run(args: CliArgs) -> Result<i32> {
    let config = build_configuration(&args)?;
    debug!(command = %config.command_line(), "configuration ready");

    let task = Task::start(&config).await?;
    info!(
        program = %task.program(),
        pid = task.pid(),
        acceptable = ?task.acceptable_exit_codes(),
        "started"
    );

    // Ctrl-C → SIGINT to the child; teardown follows its exit.
    {
        let task = task.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            task.send_signal(signal::INTERRUPT).await;
        });
    }

    if let Some(secs) = args.timeout {
        let task = task.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            if task.try_completed().is_none() {
                warn!(timeout_secs = secs, "timeout elapsed; terminating");
                task.send_signal(signal::TERMINATE).await;
            }
        });
    }

    let outcome = task.completed().await;
    print_captured(&task)?;

    match outcome {
        Ok(()) => Ok(0),
        Err(failure) => {
            eprintln!("proctask: {failure}");
            Ok(failure.status_code().filter(|code| *code > 0).unwrap_or(1))
        }
    }
}

/// Merge the task file (if any) with command-line overrides.
pub fn build_configuration(args: &CliArgs) -> Result<TaskConfiguration> {
    let mut raw = match &args.config {
        Some(path) => load_from_path(path)?,
        None if !args.command.is_empty() => RawTaskConfiguration::default(),
        None => load_from_path(default_config_path())?,
    };

    if let Some((program, rest)) = args.command.split_first() {
        raw.path = program.clone();
        raw.args = rest.to_vec();
    }

    if !args.accept.is_empty() {
        raw.acceptable_exit_codes = args.accept.iter().copied().collect();
    }

    if let Some(mode) = args.capture {
        raw.stdout = Some(StreamSpec::capture(mode));
        raw.stderr = Some(StreamSpec::capture(CaptureMode::Text));
    }
    raw.stdin.get_or_insert(StreamSpec::Inherit);
    raw.stdout.get_or_insert(StreamSpec::Inherit);
    raw.stderr.get_or_insert(StreamSpec::Inherit);

    Ok(TaskConfiguration::try_from(raw)?)
}

/// Print whatever the task captured on stdout / stderr.
fn print_captured(task: &Task) -> Result<()> {
    if let Some(content) = task.stdout() {
        write_content(&mut std::io::stdout().lock(), &content)?;
    }
    if let Some(content) = task.stderr() {
        write_content(&mut std::io::stderr().lock(), &content)?;
    }
    Ok(())
}

fn write_content(out: &mut impl Write, content: &StreamContent) -> Result<()> {
    match content {
        StreamContent::Json(value) => writeln!(out, "{value:#}")?,
        raw => out.write_all(raw.as_bytes().unwrap_or_default())?,
    }
    out.flush()?;
    Ok(())
}
