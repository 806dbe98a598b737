// src/stream/mod.rs

//! Stream attachments for the three standard streams of a task.
//!
//! A [`StreamAttachment`] is prepared before launch (`attach`, yielding an
//! [`Endpoint`] that is mounted on the child) and released after the
//! process exited (`detach`). Concrete attachments:
//!
//! - [`capture`]: pipe drained into memory (stdout / stderr).
//! - [`input`]: pipe fed from a byte buffer (stdin).
//! - [`file`]: a file on disk mounted directly on the child.
//! - [`StaticStream`]: `/dev/null` or the parent's own stream.
//!
//! Tests can plug in their own implementation through
//! [`StreamSpec::Custom`].

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{bail, Result};
use serde::{Deserialize, Deserializer};

use crate::types::{CaptureMode, Channel, StreamContent};

pub mod capture;
pub mod file;
pub mod input;

pub use capture::CaptureStream;
pub use file::FileStream;
pub use input::InputStream;

/// Boxed future returned by stream operations.
pub type StreamFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Something that can be mounted on one standard stream of a child process.
pub trait StreamAttachment: Send + Sync + fmt::Debug {
    /// Prepare the endpoint. `None` means "nothing to mount".
    fn attach(&self) -> StreamFuture<'_, Result<Option<Endpoint>>>;

    /// Release whatever `attach` acquired. Must be a no-op if the stream was
    /// never attached or was already detached.
    fn detach(&self) -> StreamFuture<'_, Result<()>>;

    /// Content gathered by the attachment, available once detached.
    fn contents(&self) -> Option<StreamContent> {
        None
    }
}

/// A mountable standard-stream endpoint.
#[derive(Debug)]
pub struct Endpoint {
    stdio: Stdio,
}

impl Endpoint {
    pub fn new(stdio: impl Into<Stdio>) -> Self {
        Self {
            stdio: stdio.into(),
        }
    }

    pub fn null() -> Self {
        Self::new(Stdio::null())
    }

    pub fn inherit() -> Self {
        Self::new(Stdio::inherit())
    }

    pub fn into_stdio(self) -> Stdio {
        self.stdio
    }
}

/// Declarative description of what to mount on a channel.
///
/// TOML form uses a `kind` tag:
///
/// ```toml
/// [stdout]
/// kind = "capture"
/// mode = "json"
///
/// [stdin]
/// kind = "input"
/// data = "hello\n"
///
/// [stderr]
/// kind = "file"
/// path = "err.log"
/// append = true
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StreamSpec {
    /// Collect the output in memory.
    ///
    /// The capture ends at EOF, not at the child's exit: if the child leaves
    /// a background process holding the stream open, teardown (and so
    /// `completed`) waits for that process too, and its output is included.
    Capture {
        #[serde(default)]
        mode: CaptureMode,
    },
    Input {
        #[serde(deserialize_with = "bytes_from_string")]
        data: Vec<u8>,
    },
    File {
        path: PathBuf,
        #[serde(default)]
        append: bool,
    },
    Null,
    Inherit,
    #[serde(skip)]
    Custom(Arc<dyn StreamAttachment>),
}

impl StreamSpec {
    pub fn capture(mode: CaptureMode) -> Self {
        StreamSpec::Capture { mode }
    }

    pub fn input(data: impl Into<Vec<u8>>) -> Self {
        StreamSpec::Input { data: data.into() }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        StreamSpec::File {
            path: path.into(),
            append: false,
        }
    }

    pub fn custom(attachment: Arc<dyn StreamAttachment>) -> Self {
        StreamSpec::Custom(attachment)
    }

    /// Short name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamSpec::Capture { .. } => "capture",
            StreamSpec::Input { .. } => "input",
            StreamSpec::File { .. } => "file",
            StreamSpec::Null => "null",
            StreamSpec::Inherit => "inherit",
            StreamSpec::Custom(_) => "custom",
        }
    }

    /// Whether this spec can be mounted on `channel`.
    pub fn supports(&self, channel: Channel) -> bool {
        match self {
            StreamSpec::Capture { .. } => channel.is_output(),
            StreamSpec::Input { .. } => !channel.is_output(),
            _ => true,
        }
    }

    /// Build a fresh attachment for `channel`.
    pub fn to_attachment(&self, channel: Channel) -> Arc<dyn StreamAttachment> {
        match self {
            StreamSpec::Capture { mode } => Arc::new(CaptureStream::new(channel, *mode)),
            StreamSpec::Input { data } => Arc::new(InputStream::new(data.clone())),
            StreamSpec::File { path, append } => {
                Arc::new(FileStream::new(channel, path.clone(), *append))
            }
            StreamSpec::Null => Arc::new(StaticStream::Null),
            StreamSpec::Inherit => Arc::new(StaticStream::Inherit),
            StreamSpec::Custom(attachment) => Arc::clone(attachment),
        }
    }
}

fn bytes_from_string<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(String::into_bytes)
}

/// Endpoints that need no setup and hold no resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticStream {
    Null,
    Inherit,
}

impl StreamAttachment for StaticStream {
    fn attach(&self) -> StreamFuture<'_, Result<Option<Endpoint>>> {
        let endpoint = match self {
            StaticStream::Null => Endpoint::null(),
            StaticStream::Inherit => Endpoint::inherit(),
        };
        Box::pin(async move { Ok(Some(endpoint)) })
    }

    fn detach(&self) -> StreamFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

const IDLE: u8 = 0;
const ATTACHED: u8 = 1;
const DETACHED: u8 = 2;

/// Attach / detach bookkeeping shared by the pipe-backed attachments.
#[derive(Debug, Default)]
pub(crate) struct Lifecycle(AtomicU8);

impl Lifecycle {
    /// Idle -> Attached. Attaching twice is an error.
    pub(crate) fn begin_attach(&self, channel: Channel) -> Result<()> {
        if self
            .0
            .compare_exchange(IDLE, ATTACHED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            bail!("{channel} stream was already attached");
        }
        Ok(())
    }

    /// Attached -> Detached. Returns `false` when there is nothing to release.
    pub(crate) fn begin_detach(&self) -> bool {
        self.0
            .compare_exchange(ATTACHED, DETACHED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
