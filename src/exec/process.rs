// src/exec/process.rs

//! Process handle abstraction and its native implementation.

use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::Child;
use tracing::{debug, info, warn};

use super::completion::{completion, Completion};
use super::signal;

/// Terminal status of a process: its exit code, or a message describing
/// why the process could not be observed.
pub type ExitResult = std::result::Result<i32, String>;

/// Single-shot future of a process's exit status.
///
/// Every clone observes the same value. It resolves once, when the OS
/// reports termination, regardless of who caused it.
#[derive(Debug, Clone)]
pub struct ExitCode {
    inner: Completion<ExitResult>,
}

impl ExitCode {
    pub fn new(inner: Completion<ExitResult>) -> Self {
        Self { inner }
    }

    /// The exit status if the process already terminated.
    pub fn peek(&self) -> Option<ExitResult> {
        self.inner.peek()
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.is_complete()
    }

    pub async fn wait(&self) -> ExitResult {
        self.inner
            .wait()
            .await
            .unwrap_or_else(|| Err("process exit was never reported".to_string()))
    }
}

/// A running OS process, as seen by a task.
pub trait ProcessHandle: Send + Sync + fmt::Debug {
    /// Process identifier, valid from launch for the lifetime of the process.
    fn pid(&self) -> u32;

    /// The exit-code future. Always the same underlying future.
    fn exit_code(&self) -> ExitCode;

    /// Deliver `signal` and return the exit-code future.
    ///
    /// Delivery problems are logged, not returned.
    fn send_signal(&self, signal: i32) -> ExitCode;
}

/// Exit code of a finished process. Death by signal `N` maps to `128 + N`.
pub fn exit_status_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(-1)
}

/// Process launched through `tokio::process`.
///
/// The `Child` is moved into a waiter task that resolves the exit code;
/// signals go straight to the pid.
#[derive(Debug)]
pub struct NativeProcess {
    pid: u32,
    program: String,
    exit_code: ExitCode,
}

impl NativeProcess {
    /// Take ownership of a freshly spawned child and start observing it.
    pub fn observe(mut child: Child, program: impl Into<String>) -> std::io::Result<Self> {
        let program = program.into();
        let pid = child
            .id()
            .ok_or_else(|| std::io::Error::other("spawned child did not report a pid"))?;

        let (completer, completion) = completion();
        let waiter_program = program.clone();

        tokio::spawn(async move {
            // Resolve first, log after: `deliver` checks the resolved code
            // and the child is already reaped at this point.
            match child.wait().await {
                Ok(status) => {
                    let code = exit_status_code(status);
                    completer.complete(Ok(code));
                    info!(
                        program = %waiter_program,
                        pid,
                        exit_code = code,
                        success = status.success(),
                        "process exited"
                    );
                }
                Err(err) => {
                    completer.complete(Err(format!("waiting for process {pid}: {err}")));
                    warn!(
                        program = %waiter_program,
                        pid,
                        error = %err,
                        "failed to wait for process"
                    );
                }
            }
        });

        Ok(Self {
            pid,
            program,
            exit_code: ExitCode::new(completion),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Ask the process to stop (SIGTERM).
    pub fn terminate(&self) -> nix::Result<()> {
        self.deliver(Signal::SIGTERM)
    }

    /// Interrupt the process (SIGINT).
    pub fn interrupt(&self) -> nix::Result<()> {
        self.deliver(Signal::SIGINT)
    }

    /// Send an arbitrary signal.
    ///
    /// Nothing is sent once the exit code resolved: the pid may already
    /// belong to another process. `ESRCH` means the process is gone already.
    ///
    /// The waiter reaps the child just before it resolves the exit code, so a
    /// signal racing with the exit can still reach a reused pid in that short
    /// window. Closing it fully needs a pidfd.
    pub fn deliver(&self, signal: Signal) -> nix::Result<()> {
        if self.exit_code.is_resolved() {
            debug!(program = %self.program, pid = self.pid, ?signal, "process already exited; signal not sent");
            return Ok(());
        }

        match kill(Pid::from_raw(self.pid as i32), signal) {
            Ok(()) => {
                debug!(program = %self.program, pid = self.pid, ?signal, "signal delivered");
                Ok(())
            }
            Err(Errno::ESRCH) => {
                debug!(program = %self.program, pid = self.pid, ?signal, "process already gone");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

impl ProcessHandle for NativeProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn exit_code(&self) -> ExitCode {
        self.exit_code.clone()
    }

    fn send_signal(&self, signal: i32) -> ExitCode {
        signal::dispatch(self, signal);
        self.exit_code.clone()
    }
}
