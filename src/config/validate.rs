// src/config/validate.rs

use std::collections::BTreeMap;
use std::time::Duration;

use regex::Regex;

use crate::config::duration::parse_duration;
use crate::config::model::{
    ConfigFile, DEFAULT_FRAME_PATTERN, DEFAULT_FRAME_TIME, JobConfig, JobKind, JobSettings,
    RawConfigFile, SupervisorSection, SupervisorSettings,
};
use crate::errors::{RendertrackError, Result};
use crate::task::{Capabilities, EstimatorConfig, FrameRange};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = RendertrackError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_jobs(&raw)?;
        let supervisor = validate_supervisor(&raw.supervisor)?;

        let mut jobs = BTreeMap::new();
        for (name, job) in &raw.job {
            jobs.insert(name.clone(), validate_job(name, job)?);
        }

        Ok(ConfigFile::new_unchecked(supervisor, jobs))
    }
}

fn ensure_has_jobs(cfg: &RawConfigFile) -> Result<()> {
    if cfg.job.is_empty() {
        return Err(RendertrackError::ConfigError(
            "config must contain at least one [job.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_supervisor(section: &SupervisorSection) -> Result<SupervisorSettings> {
    if section.max_concurrent == 0 {
        return Err(RendertrackError::ConfigError(
            "[supervisor].max_concurrent must be >= 1 (got 0)".to_string(),
        ));
    }

    let smoothing = section.smoothing;
    if !(smoothing > 0.0 && smoothing <= 1.0) {
        return Err(RendertrackError::ConfigError(format!(
            "[supervisor].smoothing must be in (0, 1] (got {smoothing})"
        )));
    }

    let stale_after = field_duration("[supervisor].stale_after", &section.stale_after)?;
    let refresh_interval =
        field_duration("[supervisor].refresh_interval", &section.refresh_interval)?;
    if refresh_interval.is_zero() {
        return Err(RendertrackError::ConfigError(
            "[supervisor].refresh_interval must be greater than zero".to_string(),
        ));
    }

    Ok(SupervisorSettings {
        queue_mode: section.queue_mode,
        max_concurrent: section.max_concurrent,
        estimator: EstimatorConfig {
            smoothing,
            stale_after,
        },
        refresh_interval,
        remove_finished: section.remove_finished,
    })
}

fn validate_job(name: &str, job: &JobConfig) -> Result<JobSettings> {
    if name.trim().is_empty() {
        return Err(RendertrackError::ConfigError(
            "job names must not be empty".to_string(),
        ));
    }
    if job.frame_step == 0 {
        return Err(RendertrackError::ConfigError(format!(
            "job '{name}': frame_step must not be 0"
        )));
    }

    let kind = match &job.cmd {
        Some(cmd) => {
            if cmd.trim().is_empty() {
                return Err(RendertrackError::ConfigError(format!(
                    "job '{name}': cmd must not be empty"
                )));
            }
            if job.frame_time.is_some() {
                return Err(RendertrackError::ConfigError(format!(
                    "job '{name}': frame_time only applies to jobs without cmd"
                )));
            }
            let pattern = job.frame_pattern.as_deref().unwrap_or(DEFAULT_FRAME_PATTERN);
            JobKind::Command {
                cmd: cmd.clone(),
                frame_pattern: frame_regex(name, pattern)?,
            }
        }
        None => {
            if job.frame_pattern.is_some() {
                return Err(RendertrackError::ConfigError(format!(
                    "job '{name}': frame_pattern requires cmd"
                )));
            }
            let frame_time = match &job.frame_time {
                Some(s) => field_duration(&format!("job '{name}': frame_time"), s)?,
                None => DEFAULT_FRAME_TIME,
            };
            JobKind::Simulated { frame_time }
        }
    };

    // A child process cannot be suspended; it can only be killed or respawned.
    let can_pause = job.can_pause && matches!(kind, JobKind::Simulated { .. });

    Ok(JobSettings {
        name: name.to_string(),
        message: job.message.clone().unwrap_or_else(|| name.to_string()),
        frame_range: FrameRange::new(job.first_frame, job.last_frame, job.frame_step),
        capabilities: Capabilities::new(can_pause, job.can_cancel),
        kind,
    })
}

fn field_duration(field: &str, value: &str) -> Result<Duration> {
    parse_duration(value).map_err(|e| RendertrackError::ConfigError(format!("{field}: {e}")))
}

fn frame_regex(name: &str, pattern: &str) -> Result<Regex> {
    let regex = Regex::new(pattern).map_err(|e| {
        RendertrackError::ConfigError(format!("job '{name}': invalid frame_pattern: {e}"))
    })?;
    if regex.captures_len() < 2 {
        return Err(RendertrackError::ConfigError(format!(
            "job '{name}': frame_pattern needs a capture group for the frame number"
        )));
    }
    Ok(regex)
}
