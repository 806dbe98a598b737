// src/exec/signal.rs

//! Signal dispatch policy for native processes.
//!
//! - SIGTERM: cooperative termination.
//! - SIGINT: interrupt.
//! - anything else: delivered to the pid as-is.

use nix::sys::signal::Signal;
use tracing::warn;

use super::process::NativeProcess;

/// Conventional "ask to stop" signal number.
pub const TERMINATE: i32 = Signal::SIGTERM as i32;

/// Conventional "interrupt" signal number.
pub const INTERRUPT: i32 = Signal::SIGINT as i32;

/// Forceful kill signal number.
pub const KILL: i32 = Signal::SIGKILL as i32;

/// What a signal number asks the process to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    Terminate,
    Interrupt,
    Raw(Signal),
}

/// Map a raw signal number onto the dispatch policy.
pub fn classify(signal: i32) -> nix::Result<SignalAction> {
    let action = match Signal::try_from(signal)? {
        Signal::SIGTERM => SignalAction::Terminate,
        Signal::SIGINT => SignalAction::Interrupt,
        other => SignalAction::Raw(other),
    };
    Ok(action)
}

/// Deliver `signal` to `process` according to the policy. Failures are
/// logged; the exit-code future is the only result callers observe.
pub fn dispatch(process: &NativeProcess, signal: i32) {
    let delivered = match classify(signal) {
        Ok(SignalAction::Terminate) => process.terminate(),
        Ok(SignalAction::Interrupt) => process.interrupt(),
        Ok(SignalAction::Raw(raw)) => process.deliver(raw),
        Err(err) => Err(err),
    };

    if let Err(err) = delivered {
        warn!(
            program = %process.program(),
            signal,
            error = %err,
            "failed to deliver signal"
        );
    }
}
