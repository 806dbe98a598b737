use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// One of the three standard streams of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Stdin,
    Stdout,
    Stderr,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Stdin, Channel::Stdout, Channel::Stderr];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Stdin => "stdin",
            Channel::Stdout => "stdout",
            Channel::Stderr => "stderr",
        }
    }

    /// True for the channels the child writes to.
    pub fn is_output(&self) -> bool {
        !matches!(self, Channel::Stdin)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How captured output is decoded once the stream is detached.
///
/// - `Bytes`: keep the raw buffer.
/// - `Text`: lossy UTF-8 string (default).
/// - `Json`: parse the whole output as one JSON document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    Bytes,
    Text,
    Json,
}

impl Default for CaptureMode {
    fn default() -> Self {
        CaptureMode::Text
    }
}

impl FromStr for CaptureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bytes" => Ok(CaptureMode::Bytes),
            "text" => Ok(CaptureMode::Text),
            "json" => Ok(CaptureMode::Json),
            other => Err(format!(
                "invalid capture mode: {other} (expected \"bytes\", \"text\" or \"json\")"
            )),
        }
    }
}

/// Content produced by a stream attachment after it was detached.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamContent {
    Bytes(Vec<u8>),
    Text(String),
    Json(serde_json::Value),
}

impl StreamContent {
    /// Text view of the content, if it is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StreamContent::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            StreamContent::Bytes(b) => Some(b),
            StreamContent::Text(s) => Some(s.as_bytes()),
            StreamContent::Json(_) => None,
        }
    }
}
