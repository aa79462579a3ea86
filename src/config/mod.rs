// src/config/mod.rs

//! Configuration loading and validation for the command server.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk and apply environment overrides
//!   (`loader.rs`).
//! - Validate durations and basic sanity (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{apply_env_overrides, load_and_validate, load_from_path, resolve};
pub use model::{
    LivenessConfig, LivenessSection, RawServerConfig, ServerConfig, ServerSection,
};
pub use validate::parse_duration;
