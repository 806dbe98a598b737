// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! A task talks to a `ProcessBackend` instead of `tokio::process` directly.
//! This makes it easy to swap in a fake backend in tests while keeping the
//! production launcher here.
//!
//! - `NativeProcessBackend` is the default implementation used by
//!   `Task::start`. It spawns a real OS process and wraps it in a
//!   [`NativeProcess`].
//! - Tests can provide their own `ProcessBackend` that hands out handles
//!   whose exit they control.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, error, info};

use crate::config::TaskConfiguration;
use crate::errors::{ProctaskError, Result};
use crate::stream::Endpoint;

use super::process::{NativeProcess, ProcessHandle};

/// Endpoints to mount on the child's standard streams. A missing endpoint
/// means the stream is connected to `/dev/null`.
#[derive(Debug, Default)]
pub struct StdioEndpoints {
    pub stdin: Option<Endpoint>,
    pub stdout: Option<Endpoint>,
    pub stderr: Option<Endpoint>,
}

pub type LaunchFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Box<dyn ProcessHandle>>> + Send + 'a>>;

/// Trait abstracting how a configured process is launched.
pub trait ProcessBackend: Send + Sync {
    /// Launch the process described by `config` with the given endpoints.
    ///
    /// On success the process is running and its pid is valid.
    fn launch<'a>(&'a self, config: &'a TaskConfiguration, stdio: StdioEndpoints)
    -> LaunchFuture<'a>;
}

/// Real backend used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeProcessBackend;

impl ProcessBackend for NativeProcessBackend {
    fn launch<'a>(
        &'a self,
        config: &'a TaskConfiguration,
        stdio: StdioEndpoints,
    ) -> LaunchFuture<'a> {
        Box::pin(async move {
            let program = config.program_name();

            let mut cmd = Command::new(config.path());
            cmd.args(config.args());
            if config.clear_env() {
                cmd.env_clear();
            }
            cmd.envs(config.env());
            if let Some(dir) = config.working_dir() {
                cmd.current_dir(dir);
            }

            cmd.stdin(mount(stdio.stdin))
                .stdout(mount(stdio.stdout))
                .stderr(mount(stdio.stderr));

            debug!(command = ?cmd, "launching process");

            let child = cmd.spawn().map_err(|source| {
                error!(program = %program, error = %source, "failed to launch process");
                ProctaskError::LaunchError {
                    program: program.clone(),
                    source,
                }
            })?;

            // Release the parent's copies of the mounted endpoints so pipe
            // readers see EOF once the child exits.
            drop(cmd);

            let process = NativeProcess::observe(child, program.clone()).map_err(|source| {
                ProctaskError::LaunchError {
                    program: program.clone(),
                    source,
                }
            })?;

            info!(program = %program, pid = process.pid(), "process launched");
            Ok(Box::new(process) as Box<dyn ProcessHandle>)
        })
    }
}

fn mount(endpoint: Option<Endpoint>) -> Stdio {
    endpoint.map_or_else(Stdio::null, Endpoint::into_stdio)
}
