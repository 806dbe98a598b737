// src/stream/file.rs

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs::OpenOptions;
use tracing::debug;

use super::{Endpoint, Lifecycle, StreamAttachment, StreamFuture};
use crate::types::Channel;

/// Mounts a file directly on a standard stream.
///
/// stdin reads from the file; stdout / stderr create it (truncating unless
/// `append` is set). The descriptor is handed to the child, so there is
/// nothing to release on detach.
#[derive(Debug)]
pub struct FileStream {
    channel: Channel,
    path: PathBuf,
    append: bool,
    lifecycle: Lifecycle,
}

impl FileStream {
    pub fn new(channel: Channel, path: impl Into<PathBuf>, append: bool) -> Self {
        Self {
            channel,
            path: path.into(),
            append,
            lifecycle: Lifecycle::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StreamAttachment for FileStream {
    fn attach(&self) -> StreamFuture<'_, Result<Option<Endpoint>>> {
        Box::pin(async move {
            self.lifecycle.begin_attach(self.channel)?;

            let mut options = OpenOptions::new();
            if self.channel.is_output() {
                options.write(true).create(true);
                if self.append {
                    options.append(true);
                } else {
                    options.truncate(true);
                }
            } else {
                options.read(true);
            }

            let file = options
                .open(&self.path)
                .await
                .with_context(|| format!("opening {:?} for {}", self.path, self.channel))?;

            debug!(channel = %self.channel, path = ?self.path, "file stream attached");
            Ok(Some(Endpoint::new(file.into_std().await)))
        })
    }

    fn detach(&self) -> StreamFuture<'_, Result<()>> {
        Box::pin(async move {
            self.lifecycle.begin_detach();
            Ok(())
        })
    }
}
