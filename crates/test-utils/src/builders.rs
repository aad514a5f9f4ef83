#![allow(dead_code)]

use std::collections::BTreeMap;

use rendertrack::config::{ConfigFile, JobConfig, RawConfigFile, SupervisorSection};
use rendertrack::exec::ExternalProcess;
use rendertrack::task::{Capabilities, FrameRange, TaskSpec};
use rendertrack::types::QueueMode;

/// Builder for `TaskSpec` to simplify test setup.
pub struct TaskSpecBuilder {
    id: String,
    frame_range: FrameRange,
    capabilities: Capabilities,
    message: Option<String>,
    process: Option<Box<dyn ExternalProcess>>,
}

impl TaskSpecBuilder {
    /// Frames 1-10, pausable and cancelable.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            frame_range: FrameRange::new(1, 10, 1),
            capabilities: Capabilities::all(),
            message: None,
            process: None,
        }
    }

    pub fn frames(mut self, first: i32, last: i32) -> Self {
        self.frame_range = FrameRange::new(first, last, 1);
        self
    }

    pub fn can_pause(mut self, val: bool) -> Self {
        self.capabilities.can_pause = val;
        self
    }

    pub fn can_cancel(mut self, val: bool) -> Self {
        self.capabilities.can_cancel = val;
        self
    }

    pub fn message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    pub fn process(mut self, process: impl ExternalProcess + 'static) -> Self {
        self.process = Some(Box::new(process));
        self
    }

    pub fn build(self) -> TaskSpec {
        let mut spec = TaskSpec::new(self.id, self.frame_range, self.capabilities);
        if let Some(message) = self.message {
            spec = spec.with_message(message);
        }
        if let Some(process) = self.process {
            spec = spec.with_process(process);
        }
        spec
    }
}

/// Builder for `ConfigFile`.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                supervisor: SupervisorSection::default(),
                job: BTreeMap::new(),
            },
        }
    }

    pub fn with_job(mut self, name: &str, job: JobConfig) -> Self {
        self.config.job.insert(name.to_string(), job);
        self
    }

    pub fn queued(mut self, max_concurrent: usize) -> Self {
        self.config.supervisor.queue_mode = QueueMode::Queued;
        self.config.supervisor.max_concurrent = max_concurrent;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `JobConfig`. Defaults to a simulated job rendering frame 1.
pub struct JobConfigBuilder {
    job: JobConfig,
}

impl JobConfigBuilder {
    pub fn new() -> Self {
        Self {
            job: JobConfig {
                message: None,
                first_frame: 1,
                last_frame: 1,
                frame_step: 1,
                can_pause: true,
                can_cancel: true,
                cmd: None,
                frame_pattern: None,
                frame_time: None,
            },
        }
    }

    pub fn frames(mut self, first: i32, last: i32) -> Self {
        self.job.first_frame = first;
        self.job.last_frame = last;
        self
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.job.cmd = Some(cmd.to_string());
        self
    }

    pub fn frame_pattern(mut self, pattern: &str) -> Self {
        self.job.frame_pattern = Some(pattern.to_string());
        self
    }

    pub fn frame_time(mut self, frame_time: &str) -> Self {
        self.job.frame_time = Some(frame_time.to_string());
        self
    }

    pub fn message(mut self, message: &str) -> Self {
        self.job.message = Some(message.to_string());
        self
    }

    pub fn can_pause(mut self, val: bool) -> Self {
        self.job.can_pause = val;
        self
    }

    pub fn build(self) -> JobConfig {
        self.job
    }
}

impl Default for JobConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
