// src/task/mod.rs

//! The task orchestrator.
//!
//! A [`Task`] owns one process handle and up to three stream slots, and
//! drives:
//!
//! attach streams -> launch -> await exit (or a signal) -> teardown
//! (signal if still running, validate status, detach streams) -> resolve
//! `completed`.
//!
//! The pure state machine lives in [`teardown`]; this module is the async
//! shell around it. Teardown runs under a per-task async mutex, so the
//! started / completed checks and the work that follows never interleave
//! with another teardown request on the same task. It always runs on a
//! spawned Tokio task, so a caller that gives up waiting cannot leave it
//! half done.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use crate::config::TaskConfiguration;
use crate::errors::{ProctaskError, Result, TaskFailure};
use crate::exec::{
    completion, signal, Completer, Completion, ExitCode, NativeProcessBackend, ProcessBackend,
    ProcessHandle, StdioEndpoints,
};
use crate::stream::{Endpoint, StreamAttachment};
use crate::types::{Channel, StreamContent};

pub mod teardown;

use teardown::{reconcile_exit, TeardownEntry, TeardownState};

/// Result delivered by [`Task::completed`].
pub type TaskOutcome = std::result::Result<(), TaskFailure>;

/// A launched subprocess and everything needed to tear it down.
///
/// Cloning yields another handle to the same task.
#[derive(Debug, Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
    completed: Completion<TaskOutcome>,
    torn_down: Completion<()>,
}

#[derive(Debug)]
struct TaskInner {
    process: Box<dyn ProcessHandle>,
    slots: StreamSlots,
    acceptable_exit_codes: BTreeSet<i32>,
    description: String,
    program: String,
    span: Span,
    state: Mutex<TeardownState>,
    teardown_completed: Completer<()>,
    completed: Completer<TaskOutcome>,
}

impl Task {
    /// Start a task using the native process backend.
    pub async fn start(config: &TaskConfiguration) -> Result<Task> {
        Self::start_with(config, &NativeProcessBackend).await
    }

    /// Start a task on the given backend.
    ///
    /// Attaches the configured streams concurrently, launches the process
    /// with the resulting endpoints, and chains teardown onto the exit-code
    /// future. Any attach or launch failure fails the whole call; streams
    /// that were already attached are released before returning.
    pub async fn start_with<B>(config: &TaskConfiguration, backend: &B) -> Result<Task>
    where
        B: ProcessBackend + ?Sized,
    {
        let program = config.program_name();
        let span = info_span!(
            "task",
            name = config.name().unwrap_or(program.as_str()),
            program = %program,
            pid = tracing::field::Empty,
        );

        let started = async {
            let slots = StreamSlots::from_config(config);

            let (stdin, stdout, stderr) = tokio::join!(
                attach_slot(Channel::Stdin, slots.stdin.as_ref()),
                attach_slot(Channel::Stdout, slots.stdout.as_ref()),
                attach_slot(Channel::Stderr, slots.stderr.as_ref()),
            );

            let endpoints = match collect_endpoints(stdin, stdout, stderr) {
                Ok(endpoints) => endpoints,
                Err(err) => {
                    warn!(error = %err, "stream attachment failed; not launching");
                    slots.release_after_failed_start(&program).await;
                    return Err(err);
                }
            };

            let process = match backend.launch(config, endpoints).await {
                Ok(process) => process,
                Err(err) => {
                    slots.release_after_failed_start(&program).await;
                    return Err(err);
                }
            };

            Ok((process, slots))
        }
        .instrument(span.clone())
        .await;

        let (process, slots) = started?;
        span.record("pid", process.pid());

        let (teardown_completed, torn_down) = completion();
        let (completed_tx, completed) = completion();

        let inner = Arc::new(TaskInner {
            process,
            slots,
            acceptable_exit_codes: config.acceptable_exit_codes().clone(),
            description: config.description(),
            program,
            span,
            state: Mutex::new(TeardownState::new()),
            teardown_completed,
            completed: completed_tx,
        });

        install_exit_chain(&inner);

        info!(
            parent: &inner.span,
            description = %inner.description,
            "task started"
        );

        Ok(Task {
            inner,
            completed,
            torn_down,
        })
    }

    pub fn pid(&self) -> u32 {
        self.inner.process.pid()
    }

    pub fn program(&self) -> &str {
        &self.inner.program
    }

    pub fn description(&self) -> &str {
        &self.inner.description
    }

    pub fn acceptable_exit_codes(&self) -> &BTreeSet<i32> {
        &self.inner.acceptable_exit_codes
    }

    /// The process's exit-code future.
    pub fn exit_code(&self) -> ExitCode {
        self.inner.process.exit_code()
    }

    /// Deliver `signal` to the process and return it once dispatched.
    ///
    /// This does not complete the task by itself: the resulting exit flows
    /// through the exit-code future into teardown like any other exit.
    pub async fn send_signal(&self, signal: i32) -> i32 {
        info!(parent: &self.inner.span, signal, "sending signal");
        let _ = self.inner.process.send_signal(signal);
        signal
    }

    /// Wait until teardown finished and return the task's outcome.
    ///
    /// Can be awaited any number of times, from any clone.
    pub async fn completed(&self) -> TaskOutcome {
        self.completed.wait().await.unwrap_or_else(|| {
            Err(TaskFailure::Observation {
                program: self.inner.program.clone(),
                message: "task was dropped before completing".to_string(),
            })
        })
    }

    /// The outcome, if teardown already finished.
    pub fn try_completed(&self) -> Option<TaskOutcome> {
        self.completed.peek()
    }

    /// True once teardown ran to completion.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.is_complete()
    }

    /// Run teardown now, terminating the process if it is still running.
    ///
    /// `message` is reported through `completed` as the reason. Returns
    /// immediately with `Ok(())` if teardown already completed.
    ///
    /// The sequence runs on its own Tokio task: dropping the returned future
    /// stops waiting for it, but never interrupts it.
    pub async fn tear_down(&self, message: Option<String>) -> std::result::Result<(), TaskFailure> {
        let inner = Arc::clone(&self.inner);
        let span = self.inner.span.clone();
        let teardown = tokio::spawn(async move { inner.tear_down(message).await }.instrument(span));

        match teardown.await {
            Ok(result) => result,
            Err(err) => {
                warn!(parent: &self.inner.span, error = %err, "teardown task aborted");
                Err(TaskFailure::Observation {
                    program: self.inner.program.clone(),
                    message: format!("teardown task aborted: {err}"),
                })
            }
        }
    }

    pub fn stdin(&self) -> Option<StreamContent> {
        self.contents(Channel::Stdin)
    }

    pub fn stdout(&self) -> Option<StreamContent> {
        self.contents(Channel::Stdout)
    }

    pub fn stderr(&self) -> Option<StreamContent> {
        self.contents(Channel::Stderr)
    }

    fn contents(&self, channel: Channel) -> Option<StreamContent> {
        self.inner.slots.get(channel).and_then(|stream| stream.contents())
    }
}

impl TaskInner {
    async fn tear_down(&self, message: Option<String>) -> std::result::Result<(), TaskFailure> {
        let mut state = self.state.lock().await;

        match state.enter() {
            TeardownEntry::Inconsistent => {
                warn!("teardown requested while a previous teardown is inconsistent");
                return Err(TaskFailure::TeardownInProgress);
            }
            TeardownEntry::AlreadyComplete => {
                debug!("teardown already completed");
                return Ok(());
            }
            TeardownEntry::Proceed => {}
        }

        info!(reason = message.as_deref(), "teardown started");

        let exit_code = self.process.exit_code();
        let exit = match exit_code.peek() {
            Some(exit) => exit,
            None => {
                debug!("process still running; requesting termination");
                self.process.send_signal(signal::TERMINATE).wait().await
            }
        };

        let mut failure =
            reconcile_exit(&self.program, &exit, &self.acceptable_exit_codes, message);

        // Streams are always released, whatever the exit status said.
        let detach_failure = self.slots.detach_all(&self.program).await;
        if failure.is_none() {
            failure = detach_failure;
        }

        state.finish();
        self.teardown_completed.complete(());

        match &failure {
            Some(failure) => warn!(exit = ?exit, error = %failure, "task completed with failure"),
            None => info!(exit = ?exit, "task completed"),
        }

        self.completed.complete(failure.map_or(Ok(()), Err));
        Ok(())
    }
}

/// Chain teardown onto the exit-code future. Installed exactly once, when
/// the task is constructed.
fn install_exit_chain(inner: &Arc<TaskInner>) {
    let exit_code = inner.process.exit_code();
    let span = inner.span.clone();
    let inner = Arc::clone(inner);

    tokio::spawn(
        async move {
            let message = exit_code.wait().await.err();
            if let Err(err) = inner.tear_down(message).await {
                warn!(error = %err, "teardown after exit failed");
            }
        }
        .instrument(span),
    );
}

async fn attach_slot(
    channel: Channel,
    slot: Option<&Arc<dyn StreamAttachment>>,
) -> Result<Option<Endpoint>> {
    let Some(stream) = slot else {
        return Ok(None);
    };

    stream
        .attach()
        .await
        .map_err(|err| ProctaskError::AttachError {
            channel,
            message: format!("{err:#}"),
        })
}

fn collect_endpoints(
    stdin: Result<Option<Endpoint>>,
    stdout: Result<Option<Endpoint>>,
    stderr: Result<Option<Endpoint>>,
) -> Result<StdioEndpoints> {
    Ok(StdioEndpoints {
        stdin: stdin?,
        stdout: stdout?,
        stderr: stderr?,
    })
}

/// The three stream slots of a task. Absent slots are never attached or
/// detached.
#[derive(Debug, Default)]
struct StreamSlots {
    stdin: Option<Arc<dyn StreamAttachment>>,
    stdout: Option<Arc<dyn StreamAttachment>>,
    stderr: Option<Arc<dyn StreamAttachment>>,
}

impl StreamSlots {
    fn from_config(config: &TaskConfiguration) -> Self {
        let slot = |channel| config.stream(channel).map(|spec| spec.to_attachment(channel));
        Self {
            stdin: slot(Channel::Stdin),
            stdout: slot(Channel::Stdout),
            stderr: slot(Channel::Stderr),
        }
    }

    fn get(&self, channel: Channel) -> Option<&Arc<dyn StreamAttachment>> {
        match channel {
            Channel::Stdin => self.stdin.as_ref(),
            Channel::Stdout => self.stdout.as_ref(),
            Channel::Stderr => self.stderr.as_ref(),
        }
    }

    /// Detach every populated slot concurrently and report the first
    /// failure.
    async fn detach_all(&self, program: &str) -> Option<TaskFailure> {
        let (stdin, stdout, stderr) = tokio::join!(
            detach_slot(Channel::Stdin, self.stdin.as_ref()),
            detach_slot(Channel::Stdout, self.stdout.as_ref()),
            detach_slot(Channel::Stderr, self.stderr.as_ref()),
        );

        [stdin, stdout, stderr]
            .into_iter()
            .flatten()
            .next()
            .map(|(channel, message)| TaskFailure::Detach {
                program: program.to_string(),
                channel,
                message,
            })
    }

    async fn release_after_failed_start(&self, program: &str) {
        if let Some(failure) = self.detach_all(program).await {
            debug!(error = %failure, "releasing streams after failed start");
        }
    }
}

async fn detach_slot(
    channel: Channel,
    slot: Option<&Arc<dyn StreamAttachment>>,
) -> Option<(Channel, String)> {
    let stream = slot?;
    match stream.detach().await {
        Ok(()) => None,
        Err(err) => {
            let message = format!("{err:#}");
            warn!(%channel, error = %message, "failed to detach stream");
            Some((channel, message))
        }
    }
}
