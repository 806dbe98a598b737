// tests/task_lifecycle.rs
//
// Orchestration semantics against a fake process backend: the test decides
// when (and how) each process exits.

use std::collections::BTreeSet;
use std::time::Duration;

mod common;
use crate::common::builders::fake;
use crate::common::{init_tracing, with_timeout, TestResult};

use proctask::errors::{ProctaskError, TaskFailure};
use proctask::exec::signal::{INTERRUPT, TERMINATE};
use proctask::task::Task;
use proctask::types::{Channel, StreamContent};
use proctask_test_utils::{FakeBackend, RecordingStream, SignalResponse};

#[tokio::test]
async fn natural_exit_with_zero_completes_successfully() -> TestResult {
    init_tracing();

    let stdout = RecordingStream::new();
    let cfg = fake("worker")
        .stdout(RecordingStream::spec(&stdout))
        .build()?;
    let backend = FakeBackend::default();

    let task = Task::start_with(&cfg, &backend).await?;
    assert_eq!(task.program(), "worker");
    assert_eq!(task.pid(), backend.last().pid());
    assert!(task.try_completed().is_none());
    assert!(!task.is_torn_down());

    backend.last().exit(0);

    assert_eq!(with_timeout(task.completed()).await, Ok(()));
    assert!(task.is_torn_down());
    assert_eq!(task.exit_code().peek(), Some(Ok(0)));
    assert_eq!(stdout.attach_count(), 1);
    assert_eq!(stdout.detach_count(), 1);
    assert!(backend.last().signals().is_empty(), "no signal for a natural exit");

    Ok(())
}

#[tokio::test]
async fn disallowed_exit_code_resolves_with_status_failure() -> TestResult {
    init_tracing();

    let cfg = fake("build").build()?;
    let backend = FakeBackend::default();
    let task = Task::start_with(&cfg, &backend).await?;

    backend.last().exit(3);

    let outcome = with_timeout(task.completed()).await;
    assert_eq!(
        outcome,
        Err(TaskFailure::Status {
            program: "build".to_string(),
            code: 3,
        })
    );
    assert_eq!(
        outcome.unwrap_err().to_string(),
        "build returned non-zero status code 3"
    );

    Ok(())
}

#[tokio::test]
async fn non_zero_code_in_acceptable_set_is_success() -> TestResult {
    init_tracing();

    let cfg = fake("grep").acceptable_exit_codes([0, 1]).build()?;
    let backend = FakeBackend::default();
    let task = Task::start_with(&cfg, &backend).await?;

    backend.last().exit(1);

    assert_eq!(with_timeout(task.completed()).await, Ok(()));
    Ok(())
}

#[tokio::test]
async fn teardown_after_completion_is_an_immediate_no_op() -> TestResult {
    init_tracing();

    let stdin = RecordingStream::new();
    let stdout = RecordingStream::new();
    let stderr = RecordingStream::new();
    let cfg = fake("idempotent")
        .stdin(RecordingStream::spec(&stdin))
        .stdout(RecordingStream::spec(&stdout))
        .stderr(RecordingStream::spec(&stderr))
        .build()?;
    let backend = FakeBackend::default();
    let task = Task::start_with(&cfg, &backend).await?;

    backend.last().exit(0);
    with_timeout(task.completed()).await?;

    assert_eq!(task.tear_down(None).await, Ok(()));
    assert_eq!(task.tear_down(Some("again".to_string())).await, Ok(()));

    for stream in [&stdin, &stdout, &stderr] {
        assert_eq!(stream.attach_count(), 1);
        assert_eq!(stream.detach_count(), 1, "streams are never re-detached");
    }
    // The outcome of the first teardown stands.
    assert_eq!(task.try_completed(), Some(Ok(())));

    Ok(())
}

#[tokio::test]
async fn terminate_signal_drives_exit_and_completion() -> TestResult {
    init_tracing();

    let stdout = RecordingStream::new();
    let cfg = fake("server")
        .stdout(RecordingStream::spec(&stdout))
        .build()?;
    let backend = FakeBackend::new(SignalResponse::Die);
    let task = Task::start_with(&cfg, &backend).await?;

    assert_eq!(task.send_signal(TERMINATE).await, TERMINATE);

    assert_eq!(with_timeout(task.exit_code().wait()).await, Ok(128 + TERMINATE));
    let outcome = with_timeout(task.completed()).await;
    assert_eq!(outcome.unwrap_err().status_code(), Some(128 + TERMINATE));
    assert_eq!(backend.last().signals(), vec![TERMINATE]);
    assert_eq!(stdout.detach_count(), 1);

    Ok(())
}

#[tokio::test]
async fn terminated_status_in_acceptable_set_is_success() -> TestResult {
    init_tracing();

    let cfg = fake("server")
        .acceptable_exit_codes([0, 128 + TERMINATE])
        .build()?;
    let backend = FakeBackend::new(SignalResponse::Die);
    let task = Task::start_with(&cfg, &backend).await?;

    task.send_signal(TERMINATE).await;

    assert_eq!(with_timeout(task.completed()).await, Ok(()));
    Ok(())
}

#[tokio::test]
async fn signal_to_exited_task_reuses_resolved_code() -> TestResult {
    init_tracing();

    let stdout = RecordingStream::new();
    let cfg = fake("oneshot")
        .stdout(RecordingStream::spec(&stdout))
        .build()?;
    let backend = FakeBackend::new(SignalResponse::Die);
    let task = Task::start_with(&cfg, &backend).await?;

    backend.last().exit(0);
    with_timeout(task.completed()).await?;

    // The fake records the delivery, but the exit code is already final.
    task.send_signal(TERMINATE).await;
    assert_eq!(task.exit_code().peek(), Some(Ok(0)));
    assert_eq!(task.tear_down(None).await, Ok(()));
    assert_eq!(task.try_completed(), Some(Ok(())));
    assert_eq!(stdout.detach_count(), 1);

    Ok(())
}

#[tokio::test]
async fn explicit_teardown_terminates_running_process() -> TestResult {
    init_tracing();

    let cfg = fake("daemon").build()?;
    let backend = FakeBackend::new(SignalResponse::Die);
    let task = Task::start_with(&cfg, &backend).await?;

    with_timeout(task.tear_down(None)).await?;

    assert!(task.is_torn_down());
    assert_eq!(backend.last().signals(), vec![TERMINATE]);
    assert_eq!(
        task.try_completed().and_then(|outcome| outcome.err()),
        Some(TaskFailure::Status {
            program: "daemon".to_string(),
            code: 128 + TERMINATE,
        })
    );

    Ok(())
}

#[tokio::test]
async fn concurrent_teardowns_run_the_sequence_once() -> TestResult {
    init_tracing();

    let stdout = RecordingStream::new();
    let cfg = fake("racy")
        .stdout(RecordingStream::spec(&stdout))
        .build()?;
    let backend = FakeBackend::new(SignalResponse::ExitWith(0));
    let task = Task::start_with(&cfg, &backend).await?;

    let (a, b, c) = with_timeout(async {
        tokio::join!(
            task.tear_down(None),
            task.tear_down(None),
            task.tear_down(None)
        )
    })
    .await;

    assert_eq!((a, b, c), (Ok(()), Ok(()), Ok(())));
    assert_eq!(backend.last().signals(), vec![TERMINATE]);
    assert_eq!(stdout.detach_count(), 1);
    assert_eq!(with_timeout(task.completed()).await, Ok(()));

    Ok(())
}

#[tokio::test]
async fn ignored_terminate_keeps_teardown_waiting_for_real_exit() -> TestResult {
    init_tracing();

    let cfg = fake("stubborn").build()?;
    let backend = FakeBackend::new(SignalResponse::Ignore);
    let task = Task::start_with(&cfg, &backend).await?;

    let teardown = tokio::spawn({
        let task = task.clone();
        async move { task.tear_down(None).await }
    });

    // Wait for the termination request to land.
    with_timeout(async {
        while backend.last().signals().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(!task.is_torn_down());

    backend.last().exit(0);

    assert_eq!(with_timeout(teardown).await?, Ok(()));
    assert_eq!(with_timeout(task.completed()).await, Ok(()));
    Ok(())
}

#[tokio::test]
async fn interrupt_is_forwarded_verbatim() -> TestResult {
    init_tracing();

    let cfg = fake("repl").build()?;
    let backend = FakeBackend::new(SignalResponse::Die);
    let task = Task::start_with(&cfg, &backend).await?;

    assert_eq!(task.send_signal(INTERRUPT).await, INTERRUPT);

    let outcome = with_timeout(task.completed()).await;
    assert_eq!(outcome.unwrap_err().status_code(), Some(128 + INTERRUPT));
    assert_eq!(backend.last().signals(), vec![INTERRUPT]);
    Ok(())
}

#[tokio::test]
async fn observation_error_is_reported_through_completed() -> TestResult {
    init_tracing();

    let stdout = RecordingStream::new();
    let cfg = fake("ghost")
        .stdout(RecordingStream::spec(&stdout))
        .build()?;
    let backend = FakeBackend::default();
    let task = Task::start_with(&cfg, &backend).await?;

    backend.last().fail_observation("wait(2) failed");

    assert_eq!(
        with_timeout(task.completed()).await,
        Err(TaskFailure::Observation {
            program: "ghost".to_string(),
            message: "wait(2) failed".to_string(),
        })
    );
    assert_eq!(stdout.detach_count(), 1, "streams released despite the error");
    Ok(())
}

#[tokio::test]
async fn stdout_attach_failure_fails_start_without_launching() -> TestResult {
    init_tracing();

    let stdin = RecordingStream::new();
    let stdout = RecordingStream::failing_attach();
    let cfg = fake("never")
        .stdin(RecordingStream::spec(&stdin))
        .stdout(RecordingStream::spec(&stdout))
        .build()?;
    let backend = FakeBackend::default();

    let result = Task::start_with(&cfg, &backend).await;

    match result {
        Err(ProctaskError::AttachError { channel, message }) => {
            assert_eq!(channel, Channel::Stdout);
            assert!(message.contains("refused to attach"));
        }
        Err(e) => panic!("Expected AttachError, got: {e:?}"),
        Ok(_) => panic!("Expected error, got a task"),
    }
    assert!(backend.launched().is_empty(), "nothing may be launched");
    assert_eq!(stdin.detach_count(), 1, "attached streams are released");

    Ok(())
}

#[tokio::test]
async fn launch_failure_fails_start_and_releases_streams() -> TestResult {
    init_tracing();

    let stdout = RecordingStream::new();
    let cfg = fake("missing")
        .stdout(RecordingStream::spec(&stdout))
        .build()?;
    let backend = FakeBackend::failing();

    match Task::start_with(&cfg, &backend).await {
        Err(ProctaskError::LaunchError { program, .. }) => assert_eq!(program, "missing"),
        Err(e) => panic!("Expected LaunchError, got: {e:?}"),
        Ok(_) => panic!("Expected error, got a task"),
    }
    assert_eq!(stdout.attach_count(), 1);
    assert_eq!(stdout.detach_count(), 1);

    Ok(())
}

#[tokio::test]
async fn detach_failure_is_reported_when_nothing_else_failed() -> TestResult {
    init_tracing();

    let stderr = RecordingStream::failing_detach();
    let cfg = fake("leaky")
        .stderr(RecordingStream::spec(&stderr))
        .build()?;
    let backend = FakeBackend::default();
    let task = Task::start_with(&cfg, &backend).await?;

    backend.last().exit(0);

    match with_timeout(task.completed()).await {
        Err(TaskFailure::Detach { channel, .. }) => assert_eq!(channel, Channel::Stderr),
        other => panic!("Expected Detach failure, got: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn status_failure_wins_over_detach_failure() -> TestResult {
    init_tracing();

    let stderr = RecordingStream::failing_detach();
    let cfg = fake("leaky")
        .stderr(RecordingStream::spec(&stderr))
        .build()?;
    let backend = FakeBackend::default();
    let task = Task::start_with(&cfg, &backend).await?;

    backend.last().exit(5);

    let outcome = with_timeout(task.completed()).await;
    assert_eq!(outcome.unwrap_err().status_code(), Some(5));
    assert_eq!(stderr.detach_count(), 1);
    Ok(())
}

#[tokio::test]
async fn unconfigured_streams_are_not_mounted() -> TestResult {
    init_tracing();

    let stdout = RecordingStream::with_text("captured");
    let cfg = fake("partial")
        .stdout(RecordingStream::spec(&stdout))
        .build()?;
    let backend = FakeBackend::default();
    let task = Task::start_with(&cfg, &backend).await?;

    assert_eq!(backend.last().mounted(), [false, true, false]);
    assert_eq!(task.stdout(), None, "no content before detach");

    backend.last().exit(0);
    with_timeout(task.completed()).await?;

    assert_eq!(task.stdin(), None);
    assert_eq!(task.stderr(), None);
    assert_eq!(task.stdout(), Some(StreamContent::Text("captured".to_string())));
    Ok(())
}

#[tokio::test]
async fn completed_is_shared_between_clones() -> TestResult {
    init_tracing();

    let cfg = fake("shared").build()?;
    let backend = FakeBackend::default();
    let task = Task::start_with(&cfg, &backend).await?;

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let task = task.clone();
            tokio::spawn(async move { task.completed().await })
        })
        .collect();

    backend.last().exit(9);

    for waiter in waiters {
        let outcome = with_timeout(waiter).await?;
        assert_eq!(outcome.unwrap_err().status_code(), Some(9));
    }
    Ok(())
}

#[tokio::test]
async fn abandoned_teardown_still_detaches_exactly_once() -> TestResult {
    init_tracing();

    let stdout = RecordingStream::slow_detach(Duration::from_millis(200));
    let cfg = fake("impatient")
        .stdout(RecordingStream::spec(&stdout))
        .build()?;
    let backend = FakeBackend::new(SignalResponse::Die);
    let task = Task::start_with(&cfg, &backend).await?;

    // Give up while the detach is still in flight.
    let waited = tokio::time::timeout(Duration::from_millis(50), task.tear_down(None)).await;
    assert!(waited.is_err(), "teardown should still be detaching");

    let outcome = with_timeout(task.completed()).await;
    assert_eq!(outcome.unwrap_err().status_code(), Some(128 + TERMINATE));
    assert!(task.is_torn_down());
    assert_eq!(stdout.detach_count(), 1, "stream detached more than once");

    // Later requests are no-ops.
    assert_eq!(with_timeout(task.tear_down(None)).await, Ok(()));
    assert_eq!(stdout.detach_count(), 1);
    assert_eq!(backend.last().signals(), vec![TERMINATE]);
    Ok(())
}

#[tokio::test]
async fn acceptable_exit_codes_are_exposed_on_the_task() -> TestResult {
    init_tracing();

    let backend = FakeBackend::default();

    let task = Task::start_with(&fake("default").build()?, &backend).await?;
    assert_eq!(task.acceptable_exit_codes(), &BTreeSet::from([0]));

    let task = Task::start_with(&fake("lenient").acceptable_exit_codes([0, 2]).build()?, &backend)
        .await?;
    assert_eq!(task.acceptable_exit_codes(), &BTreeSet::from([0, 2]));
    assert_eq!(task.description(), "/fake/bin/lenient");
    Ok(())
}
