// src/config/model.rs

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::Result;
use crate::stream::StreamSpec;
use crate::types::Channel;

/// Task description as read from a TOML file (or assembled by the
/// builder), before validation.
///
/// ```toml
/// name = "greeter"
/// path = "/bin/echo"
/// args = ["hi"]
/// acceptable_exit_codes = [0]
///
/// [env]
/// GREETING = "hi"
///
/// [stdout]
/// kind = "capture"
/// ```
///
/// Everything except `path` is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTaskConfiguration {
    /// Label attached to every log line of the task.
    #[serde(default)]
    pub name: Option<String>,

    /// Human-readable description used in diagnostics.
    #[serde(default)]
    pub description: Option<String>,

    /// Executable to launch.
    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Variables set on top of the inherited environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Start from an empty environment instead of inheriting.
    #[serde(default)]
    pub clear_env: bool,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    #[serde(default)]
    pub stdin: Option<StreamSpec>,

    #[serde(default)]
    pub stdout: Option<StreamSpec>,

    #[serde(default)]
    pub stderr: Option<StreamSpec>,

    /// Exit codes treated as success. Empty means `{0}`.
    #[serde(default)]
    pub acceptable_exit_codes: BTreeSet<i32>,
}

/// Validated, immutable launch configuration for one task.
///
/// Build one with [`TaskConfiguration::builder`] or load it from TOML with
/// [`crate::config::load_and_validate`].
#[derive(Debug, Clone)]
pub struct TaskConfiguration {
    name: Option<String>,
    description: Option<String>,
    path: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    clear_env: bool,
    working_dir: Option<PathBuf>,
    stdin: Option<StreamSpec>,
    stdout: Option<StreamSpec>,
    stderr: Option<StreamSpec>,
    acceptable_exit_codes: BTreeSet<i32>,
}

impl TaskConfiguration {
    /// Start building a configuration for the executable at `path`.
    pub fn builder(path: impl Into<String>) -> TaskConfigurationBuilder {
        TaskConfigurationBuilder::new(path)
    }

    /// Construct without validation. Only [`TryFrom<RawTaskConfiguration>`]
    /// should call this.
    pub(crate) fn new_unchecked(raw: RawTaskConfiguration) -> Self {
        let mut acceptable_exit_codes = raw.acceptable_exit_codes;
        if acceptable_exit_codes.is_empty() {
            acceptable_exit_codes.insert(0);
        }

        Self {
            name: raw.name,
            description: raw.description,
            path: raw.path,
            args: raw.args,
            env: raw.env,
            clear_env: raw.clear_env,
            working_dir: raw.working_dir,
            stdin: raw.stdin,
            stdout: raw.stdout,
            stderr: raw.stderr,
            acceptable_exit_codes,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn clear_env(&self) -> bool {
        self.clear_env
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn stream(&self, channel: Channel) -> Option<&StreamSpec> {
        match channel {
            Channel::Stdin => self.stdin.as_ref(),
            Channel::Stdout => self.stdout.as_ref(),
            Channel::Stderr => self.stderr.as_ref(),
        }
    }

    pub fn acceptable_exit_codes(&self) -> &BTreeSet<i32> {
        &self.acceptable_exit_codes
    }

    /// Last component of the launch path, e.g. `echo` for `/bin/echo`.
    pub fn program_name(&self) -> String {
        Path::new(&self.path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.clone())
    }

    /// The configured description, or the command line.
    pub fn description(&self) -> String {
        match &self.description {
            Some(description) => description.clone(),
            None => self.command_line(),
        }
    }

    pub fn command_line(&self) -> String {
        let mut line = self.path.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Builder for [`TaskConfiguration`].
#[derive(Debug, Clone)]
pub struct TaskConfigurationBuilder {
    raw: RawTaskConfiguration,
}

impl TaskConfigurationBuilder {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            raw: RawTaskConfiguration {
                path: path.into(),
                ..RawTaskConfiguration::default()
            },
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.raw.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.raw.description = Some(description.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.raw.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.raw.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.raw.env.insert(key.into(), value.into());
        self
    }

    pub fn clear_env(mut self, clear: bool) -> Self {
        self.raw.clear_env = clear;
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.raw.working_dir = Some(dir.into());
        self
    }

    pub fn stdin(mut self, spec: StreamSpec) -> Self {
        self.raw.stdin = Some(spec);
        self
    }

    pub fn stdout(mut self, spec: StreamSpec) -> Self {
        self.raw.stdout = Some(spec);
        self
    }

    pub fn stderr(mut self, spec: StreamSpec) -> Self {
        self.raw.stderr = Some(spec);
        self
    }

    pub fn accept(mut self, code: i32) -> Self {
        self.raw.acceptable_exit_codes.insert(code);
        self
    }

    pub fn acceptable_exit_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.raw.acceptable_exit_codes = codes.into_iter().collect();
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<TaskConfiguration> {
        TaskConfiguration::try_from(self.raw)
    }
}
