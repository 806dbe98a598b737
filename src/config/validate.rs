// src/config/validate.rs

use crate::config::model::{RawTaskConfiguration, TaskConfiguration};
use crate::errors::{ProctaskError, Result};
use crate::types::Channel;

impl TryFrom<RawTaskConfiguration> for TaskConfiguration {
    type Error = crate::errors::ProctaskError;

    fn try_from(raw: RawTaskConfiguration) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(TaskConfiguration::new_unchecked(raw))
    }
}

/// Check a raw configuration without building it.
pub fn validate_config(cfg: &RawTaskConfiguration) -> Result<()> {
    validate_path(cfg)?;
    validate_args(cfg)?;
    validate_env(cfg)?;
    validate_streams(cfg)?;
    Ok(())
}

fn validate_path(cfg: &RawTaskConfiguration) -> Result<()> {
    if cfg.path.trim().is_empty() {
        return Err(ProctaskError::ConfigError(
            "`path` must name the executable to launch".to_string(),
        ));
    }
    if cfg.path.contains('\0') {
        return Err(ProctaskError::ConfigError(format!(
            "`path` {:?} contains a NUL byte",
            cfg.path
        )));
    }
    if let Some(dir) = &cfg.working_dir {
        if dir.as_os_str().is_empty() {
            return Err(ProctaskError::ConfigError(
                "`working_dir` must not be empty when set".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_args(cfg: &RawTaskConfiguration) -> Result<()> {
    for (index, arg) in cfg.args.iter().enumerate() {
        if arg.contains('\0') {
            return Err(ProctaskError::ConfigError(format!(
                "argument {index} ({arg:?}) contains a NUL byte"
            )));
        }
    }
    Ok(())
}

fn validate_env(cfg: &RawTaskConfiguration) -> Result<()> {
    for (key, value) in cfg.env.iter() {
        if key.is_empty() || key.contains('=') || key.contains('\0') {
            return Err(ProctaskError::ConfigError(format!(
                "invalid environment variable name {key:?}"
            )));
        }
        if value.contains('\0') {
            return Err(ProctaskError::ConfigError(format!(
                "environment variable '{key}' contains a NUL byte"
            )));
        }
    }
    Ok(())
}

fn validate_streams(cfg: &RawTaskConfiguration) -> Result<()> {
    let slots = [
        (Channel::Stdin, cfg.stdin.as_ref()),
        (Channel::Stdout, cfg.stdout.as_ref()),
        (Channel::Stderr, cfg.stderr.as_ref()),
    ];

    for (channel, spec) in slots {
        let Some(spec) = spec else { continue };
        if !spec.supports(channel) {
            return Err(ProctaskError::ConfigError(format!(
                "a `{}` stream cannot be mounted on {channel}",
                spec.kind()
            )));
        }
    }
    Ok(())
}
