use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::bail;
use proctask::stream::{Endpoint, StreamAttachment, StreamFuture, StreamSpec};
use proctask::types::StreamContent;

/// A stream attachment that counts how often it was attached / detached.
///
/// It mounts `/dev/null`, can be told to fail on attach or detach or to
/// take a while to detach, and reports a fixed content once detached.
#[derive(Debug, Default)]
pub struct RecordingStream {
    attaches: AtomicUsize,
    detaches: AtomicUsize,
    fail_attach: bool,
    fail_detach: bool,
    detach_delay: Option<Duration>,
    content: Mutex<Option<StreamContent>>,
}

impl RecordingStream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_attach() -> Arc<Self> {
        Arc::new(Self {
            fail_attach: true,
            ..Self::default()
        })
    }

    pub fn failing_detach() -> Arc<Self> {
        Arc::new(Self {
            fail_detach: true,
            ..Self::default()
        })
    }

    /// A stream whose detach is counted immediately but only returns after
    /// `delay`.
    pub fn slow_detach(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            detach_delay: Some(delay),
            ..Self::default()
        })
    }

    /// A stream that reports `text` as its content once detached.
    pub fn with_text(text: &str) -> Arc<Self> {
        Arc::new(Self {
            content: Mutex::new(Some(StreamContent::Text(text.to_string()))),
            ..Self::default()
        })
    }

    pub fn attach_count(&self) -> usize {
        self.attaches.load(Ordering::SeqCst)
    }

    pub fn detach_count(&self) -> usize {
        self.detaches.load(Ordering::SeqCst)
    }

    /// Wrap this stream as a spec for a task configuration.
    pub fn spec(stream: &Arc<Self>) -> StreamSpec {
        StreamSpec::custom(Arc::clone(stream) as Arc<dyn StreamAttachment>)
    }
}

impl StreamAttachment for RecordingStream {
    fn attach(&self) -> StreamFuture<'_, anyhow::Result<Option<Endpoint>>> {
        Box::pin(async move {
            self.attaches.fetch_add(1, Ordering::SeqCst);
            if self.fail_attach {
                bail!("recording stream refused to attach");
            }
            Ok(Some(Endpoint::null()))
        })
    }

    fn detach(&self) -> StreamFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            self.detaches.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.detach_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_detach {
                bail!("recording stream refused to detach");
            }
            Ok(())
        })
    }

    fn contents(&self) -> Option<StreamContent> {
        if self.detach_count() == 0 {
            return None;
        }
        self.content.lock().unwrap().clone()
    }
}
