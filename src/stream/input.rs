// src/stream/input.rs

use std::io::{self, Write};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::debug;

use super::{lock, Endpoint, Lifecycle, StreamAttachment, StreamFuture};
use crate::types::Channel;

/// Feeds a fixed buffer to the child's stdin, then closes it.
#[derive(Debug)]
pub struct InputStream {
    data: Vec<u8>,
    lifecycle: Lifecycle,
    writer: Mutex<Option<JoinHandle<io::Result<()>>>>,
}

impl InputStream {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            lifecycle: Lifecycle::default(),
            writer: Mutex::new(None),
        }
    }
}

impl StreamAttachment for InputStream {
    fn attach(&self) -> StreamFuture<'_, Result<Option<Endpoint>>> {
        Box::pin(async move {
            self.lifecycle.begin_attach(Channel::Stdin)?;

            let (read_end, mut write_end) =
                io::pipe().context("creating stdin input pipe")?;

            let data = self.data.clone();
            let handle = tokio::task::spawn_blocking(move || {
                // Dropping `write_end` afterwards is what signals EOF.
                write_end.write_all(&data)
            });
            *lock(&self.writer) = Some(handle);

            debug!(bytes = self.data.len(), "stdin input pipe attached");
            Ok(Some(Endpoint::new(read_end)))
        })
    }

    fn detach(&self) -> StreamFuture<'_, Result<()>> {
        Box::pin(async move {
            if !self.lifecycle.begin_detach() {
                return Ok(());
            }

            let handle = lock(&self.writer).take();
            let Some(handle) = handle else {
                return Ok(());
            };

            match handle.await.context("stdin writer did not finish")? {
                Ok(()) => Ok(()),
                // The child exited without reading everything.
                Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                    debug!("stdin closed by child before all input was written");
                    Ok(())
                }
                Err(err) => Err(err).context("writing stdin input"),
            }
        })
    }
}
