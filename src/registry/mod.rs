// src/registry/mod.rs

//! Task registry.
//!
//! - [`task_registry`] owns the live tasks and applies every mutation.
//! - [`selection`] derives which table controls are usable for a selection.

pub mod selection;
pub mod task_registry;

pub use selection::{controls_for, ControlState};
pub use task_registry::{RegistryOptions, TaskRegistry};
