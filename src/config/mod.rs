// src/config/mod.rs

//! Task configuration for proctask.
//!
//! Responsibilities:
//! - Define the TOML-backed data model and builder (`model.rs`).
//! - Load a task file from disk (`loader.rs`).
//! - Validate basic invariants like a non-empty launch path (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_str};
pub use model::{RawTaskConfiguration, TaskConfiguration, TaskConfigurationBuilder};
pub use validate::validate_config;
