// src/exec/completion.rs

//! Single-resolution values shared between tasks.
//!
//! A [`Completer`] writes a value at most once; any number of cloned
//! [`Completion`] handles can peek at it or await it. Backed by a
//! `tokio::sync::watch` channel holding `Option<T>`.

use tokio::sync::watch;

/// Create a linked completer / completion pair.
pub fn completion<T>() -> (Completer<T>, Completion<T>) {
    let (tx, rx) = watch::channel(None);
    (Completer { tx }, Completion { rx })
}

/// Write side. Only the first call to [`Completer::complete`] has an effect.
#[derive(Debug)]
pub struct Completer<T> {
    tx: watch::Sender<Option<T>>,
}

impl<T: Clone> Completer<T> {
    /// Resolve the value. Returns `false` if it was already resolved.
    pub fn complete(&self, value: T) -> bool {
        let mut slot = Some(value);
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = slot.take();
            true
        })
    }

    pub fn is_complete(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn subscribe(&self) -> Completion<T> {
        Completion {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read side.
#[derive(Debug, Clone)]
pub struct Completion<T> {
    rx: watch::Receiver<Option<T>>,
}

impl<T: Clone> Completion<T> {
    /// Current value, without waiting.
    pub fn peek(&self) -> Option<T> {
        self.rx.borrow().clone()
    }

    pub fn is_complete(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Wait for the value.
    ///
    /// Returns `None` only if the completer was dropped without ever
    /// resolving.
    pub async fn wait(&self) -> Option<T> {
        let mut rx = self.rx.clone();
        let value = match rx.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        };
        value
    }
}
