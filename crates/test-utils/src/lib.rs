pub mod builders;
pub mod fake_process;
pub mod recording_stream;

use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

pub use fake_process::{FakeBackend, FakeProcessControl, SignalResponse};
pub use recording_stream::RecordingStream;

static INIT: Once = Once::new();

/// Upper bound for any single wait in a test. Generous enough for the
/// real-process tests, which sleep for up to a second.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Route task and process logs into the test harness.
///
/// Output shows up only for failing tests (or with `--nocapture`). The
/// filter defaults to `proctask=debug,warn`; override it with `RUST_LOG`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("proctask=debug,warn"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, failing the test if it takes longer than [`TEST_TIMEOUT`].
///
/// A hung teardown or capture shows up as a panic instead of a stuck run.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    match tokio::time::timeout(TEST_TIMEOUT, f).await {
        Ok(value) => value,
        Err(_) => panic!("waited more than {TEST_TIMEOUT:?}; task or process hung"),
    }
}
