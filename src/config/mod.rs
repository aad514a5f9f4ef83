// src/config/mod.rs

//! Configuration for the `rendertrack` binary.
//!
//! - [`model`] holds the TOML shape ([`RawConfigFile`]) and the validated,
//!   typed form ([`ConfigFile`]).
//! - [`loader`] reads files.
//! - [`validate`] turns raw into typed config.
//! - [`duration`] parses `"250ms"` / `"3s"` style durations.

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, JobConfig, JobKind, JobSettings, RawConfigFile, SupervisorSection,
    SupervisorSettings,
};
