// src/stream/capture.rs

//! In-memory capture of a child's stdout or stderr.

use std::io::{self, Read};
use std::sync::{Mutex, OnceLock};

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::debug;

use super::{lock, Endpoint, Lifecycle, StreamAttachment, StreamFuture};
use crate::types::{CaptureMode, Channel, StreamContent};

/// Pipe whose read end is drained into memory on a blocking thread.
///
/// The reader finishes at EOF, i.e. once every copy of the write end is
/// closed. `detach` waits for that, so it returns only after the child (and
/// anything it forked that kept the stream open) has gone away.
#[derive(Debug)]
pub struct CaptureStream {
    channel: Channel,
    mode: CaptureMode,
    lifecycle: Lifecycle,
    reader: Mutex<Option<JoinHandle<io::Result<Vec<u8>>>>>,
    content: OnceLock<StreamContent>,
}

impl CaptureStream {
    pub fn new(channel: Channel, mode: CaptureMode) -> Self {
        Self {
            channel,
            mode,
            lifecycle: Lifecycle::default(),
            reader: Mutex::new(None),
            content: OnceLock::new(),
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }
}

impl StreamAttachment for CaptureStream {
    fn attach(&self) -> StreamFuture<'_, Result<Option<Endpoint>>> {
        Box::pin(async move {
            self.lifecycle.begin_attach(self.channel)?;

            let (mut read_end, write_end) = io::pipe()
                .with_context(|| format!("creating {} capture pipe", self.channel))?;

            let handle = tokio::task::spawn_blocking(move || {
                let mut buf = Vec::new();
                read_end.read_to_end(&mut buf)?;
                Ok(buf)
            });
            *lock(&self.reader) = Some(handle);

            debug!(channel = %self.channel, mode = ?self.mode, "capture pipe attached");
            Ok(Some(Endpoint::new(write_end)))
        })
    }

    fn detach(&self) -> StreamFuture<'_, Result<()>> {
        Box::pin(async move {
            if !self.lifecycle.begin_detach() {
                return Ok(());
            }

            let handle = lock(&self.reader).take();
            let Some(handle) = handle else {
                return Ok(());
            };

            let bytes = handle
                .await
                .with_context(|| format!("{} capture reader did not finish", self.channel))?
                .with_context(|| format!("reading captured {}", self.channel))?;

            debug!(channel = %self.channel, bytes = bytes.len(), "capture pipe drained");

            let content = decode(self.mode, bytes)
                .with_context(|| format!("decoding captured {}", self.channel))?;
            let _ = self.content.set(content);
            Ok(())
        })
    }

    fn contents(&self) -> Option<StreamContent> {
        self.content.get().cloned()
    }
}

fn decode(mode: CaptureMode, bytes: Vec<u8>) -> Result<StreamContent> {
    let content = match mode {
        CaptureMode::Bytes => StreamContent::Bytes(bytes),
        CaptureMode::Text => StreamContent::Text(String::from_utf8_lossy(&bytes).into_owned()),
        CaptureMode::Json => StreamContent::Json(serde_json::from_slice(&bytes)?),
    };
    Ok(content)
}
