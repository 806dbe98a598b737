// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the configured program,
//! using `tokio::process::Command`, and reporting its termination through a
//! single-shot exit-code future.
//!
//! - [`completion`] is the "resolve once, read many" primitive everything
//!   else is built on.
//! - [`process`] defines the `ProcessHandle` trait and the native handle.
//! - [`signal`] holds the signal dispatch policy.
//! - [`backend`] provides the `ProcessBackend` trait and the concrete
//!   `NativeProcessBackend` that tasks use in production, and which tests
//!   can replace with a fake implementation.

pub mod backend;
pub mod completion;
pub mod process;
pub mod signal;

pub use backend::{LaunchFuture, NativeProcessBackend, ProcessBackend, StdioEndpoints};
pub use completion::{completion, Completer, Completion};
pub use process::{ExitCode, ExitResult, NativeProcess, ProcessHandle};
