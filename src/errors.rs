// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::types::Channel;

#[derive(Error, Debug)]
pub enum ProctaskError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to attach {channel}: {message}")]
    AttachError { channel: Channel, message: String },

    #[error("failed to launch '{program}': {source}")]
    LaunchError {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Task(#[from] TaskFailure),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure reported through a task's `completed` future.
///
/// Cloneable so that every waiter observes the same value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure {
    #[error("{program} returned non-zero status code {code}")]
    Status { program: String, code: i32 },

    #[error("{program} could not be observed: {message}")]
    Observation { program: String, message: String },

    #[error("{program} failed to release {channel}: {message}")]
    Detach {
        program: String,
        channel: Channel,
        message: String,
    },

    #[error("teardown in progress")]
    TeardownInProgress,
}

impl TaskFailure {
    /// Exit code carried by a status failure.
    pub fn status_code(&self) -> Option<i32> {
        match self {
            TaskFailure::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ProctaskError>;
