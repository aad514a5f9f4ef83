// src/task/mod.rs

//! Per-job records.
//!
//! - [`model`] holds the task record, its spec and the read-only row.
//! - [`transitions`] is the task state machine.
//! - [`estimator`] computes remaining time from progress samples.

pub mod estimator;
pub mod model;
pub mod transitions;

pub use estimator::{EstimatorConfig, TimeEstimator};
pub use model::{Capabilities, FrameRange, TaskRow, TaskSpec};
pub use transitions::Transition;
