//! Sentinel Configuration Module
//!
//! Liveness thresholds, recovery pacing, reconnect ladder and storage location,
//! loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `SENTINEL_CONFIG` environment variable (path to TOML file)
//! 2. `sentinel.toml` in the current working directory
//! 3. Built-in defaults from [`defaults`]
//!
//! The loaded config is passed explicitly to the supervisor; there is no
//! global instance.

mod sentinel_config;
pub mod defaults;
pub mod validation;

pub use sentinel_config::*;
