use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use proctask::config::TaskConfiguration;
use proctask::errors::ProctaskError;
use proctask::exec::{
    completion, Completer, ExitCode, ExitResult, LaunchFuture, ProcessBackend, ProcessHandle,
    StdioEndpoints,
};

/// How a fake process reacts to a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalResponse {
    /// Exit with `128 + signal`, like a process killed by it.
    Die,
    /// Record the signal and keep running.
    Ignore,
    /// Exit with this code.
    ExitWith(i32),
}

/// Test-side control over one fake process.
#[derive(Debug, Clone)]
pub struct FakeProcessControl {
    pid: u32,
    exit: Arc<Completer<ExitResult>>,
    signals: Arc<Mutex<Vec<i32>>>,
    mounted: [bool; 3],
}

impl FakeProcessControl {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Make the process exit with `code`. Returns false if it already exited.
    pub fn exit(&self, code: i32) -> bool {
        self.exit.complete(Ok(code))
    }

    /// Make exit observation fail with `message`.
    pub fn fail_observation(&self, message: &str) -> bool {
        self.exit.complete(Err(message.to_string()))
    }

    pub fn has_exited(&self) -> bool {
        self.exit.is_complete()
    }

    /// Every signal delivered so far, in order.
    pub fn signals(&self) -> Vec<i32> {
        self.signals.lock().unwrap().clone()
    }

    /// Which of stdin / stdout / stderr received an endpoint at launch.
    pub fn mounted(&self) -> [bool; 3] {
        self.mounted
    }
}

#[derive(Debug)]
struct FakeProcess {
    control: FakeProcessControl,
    response: SignalResponse,
}

impl ProcessHandle for FakeProcess {
    fn pid(&self) -> u32 {
        self.control.pid
    }

    fn exit_code(&self) -> ExitCode {
        ExitCode::new(self.control.exit.subscribe())
    }

    fn send_signal(&self, signal: i32) -> ExitCode {
        self.control.signals.lock().unwrap().push(signal);
        match self.response {
            SignalResponse::Die => {
                self.control.exit(128 + signal);
            }
            SignalResponse::ExitWith(code) => {
                self.control.exit(code);
            }
            SignalResponse::Ignore => {}
        }
        self.exit_code()
    }
}

/// A backend that hands out fake processes whose exit the test controls.
#[derive(Debug)]
pub struct FakeBackend {
    response: SignalResponse,
    fail_launch: bool,
    next_pid: AtomicU32,
    launched: Mutex<Vec<FakeProcessControl>>,
}

impl FakeBackend {
    pub fn new(response: SignalResponse) -> Self {
        Self {
            response,
            fail_launch: false,
            next_pid: AtomicU32::new(4000),
            launched: Mutex::new(Vec::new()),
        }
    }

    /// A backend whose every launch fails with `NotFound`.
    pub fn failing() -> Self {
        Self {
            fail_launch: true,
            ..Self::new(SignalResponse::Die)
        }
    }

    /// Controls for every process launched so far.
    pub fn launched(&self) -> Vec<FakeProcessControl> {
        self.launched.lock().unwrap().clone()
    }

    /// Control for the most recent launch.
    pub fn last(&self) -> FakeProcessControl {
        self.launched
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no process was launched")
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new(SignalResponse::Die)
    }
}

impl ProcessBackend for FakeBackend {
    fn launch<'a>(
        &'a self,
        config: &'a TaskConfiguration,
        stdio: StdioEndpoints,
    ) -> LaunchFuture<'a> {
        Box::pin(async move {
            if self.fail_launch {
                return Err(ProctaskError::LaunchError {
                    program: config.program_name(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "fake launch failure"),
                });
            }

            let (exit, _) = completion();
            let control = FakeProcessControl {
                pid: self.next_pid.fetch_add(1, Ordering::SeqCst),
                exit: Arc::new(exit),
                signals: Arc::new(Mutex::new(Vec::new())),
                mounted: [
                    stdio.stdin.is_some(),
                    stdio.stdout.is_some(),
                    stdio.stderr.is_some(),
                ],
            };
            self.launched.lock().unwrap().push(control.clone());

            Ok(Box::new(FakeProcess {
                control,
                response: self.response,
            }) as Box<dyn ProcessHandle>)
        })
    }
}
