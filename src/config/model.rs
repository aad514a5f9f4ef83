// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::engine::SupervisorOptions;
use crate::registry::RegistryOptions;
use crate::task::{Capabilities, EstimatorConfig, FrameRange};
use crate::types::QueueMode;

/// Configuration file exactly as read from TOML.
///
/// ```toml
/// [supervisor]
/// queue_mode = "queued"
/// max_concurrent = 1
/// smoothing = 0.5
/// stale_after = "10s"
/// refresh_interval = "500ms"
/// remove_finished = false
///
/// [job.beauty]
/// first_frame = 1
/// last_frame = 48
/// frame_time = "50ms"
///
/// [job.comp]
/// message = "Writing comp"
/// first_frame = 1
/// last_frame = 10
/// cmd = "./render.sh comp"
/// frame_pattern = "^Rendered frame (\\d+)"
/// ```
///
/// All sections are optional and have reasonable defaults; validation
/// requires at least one job.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    /// Supervisor behaviour from `[supervisor]`.
    #[serde(default)]
    pub supervisor: SupervisorSection,

    /// All jobs from `[job.<name>]`, keyed by job (task) identity.
    #[serde(default)]
    pub job: BTreeMap<String, JobConfig>,
}

/// `[supervisor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorSection {
    /// `"parallel"` (default) or `"queued"`.
    #[serde(default)]
    pub queue_mode: QueueMode,

    /// Concurrent-running limit while `queue_mode = "queued"`.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Weight of the newest sample in the remaining-time average, `(0, 1]`.
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,

    /// Without progress for this long, the estimate is shown as unknown.
    #[serde(default = "default_stale_after")]
    pub stale_after: String,

    /// Period of the supervisor refresh tick.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: String,

    /// Remove finished tasks from the table as soon as they end.
    #[serde(default)]
    pub remove_finished: bool,
}

fn default_max_concurrent() -> usize {
    1
}

fn default_smoothing() -> f64 {
    crate::task::estimator::DEFAULT_SMOOTHING
}

fn default_stale_after() -> String {
    "10s".to_string()
}

fn default_refresh_interval() -> String {
    "500ms".to_string()
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            queue_mode: QueueMode::default(),
            max_concurrent: default_max_concurrent(),
            smoothing: default_smoothing(),
            stale_after: default_stale_after(),
            refresh_interval: default_refresh_interval(),
            remove_finished: false,
        }
    }
}

/// `[job.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// Label shown in the table; defaults to the job name.
    #[serde(default)]
    pub message: Option<String>,

    #[serde(default = "default_frame")]
    pub first_frame: i32,

    #[serde(default = "default_frame")]
    pub last_frame: i32,

    #[serde(default = "default_frame")]
    pub frame_step: i32,

    #[serde(default = "default_true")]
    pub can_pause: bool,

    #[serde(default = "default_true")]
    pub can_cancel: bool,

    /// External command to run. Without it the job is simulated in-process.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Regex with one capture group matching a rendered frame number in the
    /// command's stdout.
    #[serde(default)]
    pub frame_pattern: Option<String>,

    /// Per-frame time of a simulated job (e.g. `"100ms"`).
    #[serde(default)]
    pub frame_time: Option<String>,
}

fn default_frame() -> i32 {
    1
}

fn default_true() -> bool {
    true
}

/// Default frame pattern: any line such as `frame 12` / `Frame: 12`.
pub const DEFAULT_FRAME_PATTERN: &str = r"(?i)\bframe\D*(-?\d+)";

/// Default simulated per-frame time.
pub const DEFAULT_FRAME_TIME: Duration = Duration::from_millis(100);

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub supervisor: SupervisorSettings,
    pub jobs: BTreeMap<String, JobSettings>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        supervisor: SupervisorSettings,
        jobs: BTreeMap<String, JobSettings>,
    ) -> Self {
        Self { supervisor, jobs }
    }
}

/// Typed `[supervisor]` settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupervisorSettings {
    pub queue_mode: QueueMode,
    pub max_concurrent: usize,
    pub estimator: EstimatorConfig,
    pub refresh_interval: Duration,
    pub remove_finished: bool,
}

impl SupervisorSettings {
    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            estimator: self.estimator,
            queue_mode: self.queue_mode,
            max_concurrent: self.max_concurrent,
            remove_finished: self.remove_finished,
        }
    }

    pub fn supervisor_options(&self, exit_when_idle: bool) -> SupervisorOptions {
        SupervisorOptions {
            registry: self.registry_options(),
            refresh_interval: self.refresh_interval,
            exit_when_idle,
        }
    }
}

/// How a job does its work.
#[derive(Debug, Clone)]
pub enum JobKind {
    /// In-process frame loop sleeping `frame_time` per frame.
    Simulated { frame_time: Duration },
    /// External command whose stdout reports rendered frames.
    Command { cmd: String, frame_pattern: Regex },
}

/// Typed `[job.<name>]` settings.
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub name: String,
    pub message: String,
    pub frame_range: FrameRange,
    pub capabilities: Capabilities,
    pub kind: JobKind,
}
