// src/task/estimator.rs

//! Remaining-time estimation from progress samples.
//!
//! The estimator is deliberately clock-agnostic: every method takes the
//! current `Instant` so the owning supervisor (and tests) decide what "now"
//! means.

use std::time::{Duration, Instant};

use crate::types::Remaining;

/// Default weight given to the newest raw estimate when smoothing.
pub const DEFAULT_SMOOTHING: f64 = 0.5;

/// Default time without samples after which an estimate is no longer shown.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(10);

/// Tuning knobs shared by every task's estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorConfig {
    /// Weight of the newest raw estimate in the exponential moving average,
    /// in `(0, 1]`. `1.0` disables smoothing.
    pub smoothing: f64,
    /// Without a new sample for longer than this, the estimate becomes
    /// indeterminate.
    pub stale_after: Duration,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            smoothing: DEFAULT_SMOOTHING,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }
}

impl EstimatorConfig {
    fn weight(&self) -> f64 {
        if self.smoothing.is_finite() && self.smoothing > 0.0 {
            self.smoothing.min(1.0)
        } else {
            DEFAULT_SMOOTHING
        }
    }
}

/// Per-task remaining-time estimator.
#[derive(Debug, Clone)]
pub struct TimeEstimator {
    config: EstimatorConfig,
    started_at: Instant,
    /// Wall time spent paused, excluded from the elapsed time.
    paused_total: Duration,
    paused_since: Option<Instant>,
    last_sample_at: Option<Instant>,
    last_progress: f64,
    /// Smoothed remaining time in seconds.
    smoothed: Option<f64>,
}

impl TimeEstimator {
    pub fn new(config: EstimatorConfig, now: Instant) -> Self {
        Self {
            config,
            started_at: now,
            paused_total: Duration::ZERO,
            paused_since: None,
            last_sample_at: None,
            last_progress: 0.0,
            smoothed: None,
        }
    }

    pub fn config(&self) -> EstimatorConfig {
        self.config
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn last_sample_at(&self) -> Option<Instant> {
        self.last_sample_at
    }

    pub fn last_progress(&self) -> f64 {
        self.last_progress
    }

    /// Forget everything and start measuring again from `now`.
    pub fn reset(&mut self, now: Instant) {
        *self = Self::new(self.config, now);
    }

    /// Active (non-paused) time since the start.
    pub fn elapsed(&self, now: Instant) -> Duration {
        let mut paused = self.paused_total;
        if let Some(since) = self.paused_since {
            paused += now.saturating_duration_since(since);
        }
        now.saturating_duration_since(self.started_at)
            .saturating_sub(paused)
    }

    pub fn pause(&mut self, now: Instant) {
        if self.paused_since.is_none() {
            self.paused_since = Some(now);
        }
    }

    pub fn resume(&mut self, now: Instant) {
        if let Some(since) = self.paused_since.take() {
            self.paused_total += now.saturating_duration_since(since);
            // The pause itself is not a silence from the job.
            if self.last_sample_at.is_some() {
                self.last_sample_at = Some(now);
            }
        }
    }

    /// Feed a new `(now, progress)` sample and return the updated estimate.
    pub fn sample(&mut self, now: Instant, progress: f64) -> Remaining {
        self.last_sample_at = Some(now);
        self.last_progress = progress;

        let elapsed = self.elapsed(now).as_secs_f64();
        if progress <= 0.0 || elapsed <= 0.0 {
            self.smoothed = None;
            return Remaining::Indeterminate;
        }

        let rate = progress / elapsed;
        let raw = ((1.0 - progress).max(0.0)) / rate;
        if !raw.is_finite() {
            return Remaining::Indeterminate;
        }

        let w = self.config.weight();
        let blended = match self.smoothed {
            Some(prev) => w * raw + (1.0 - w) * prev,
            None => raw,
        };
        self.smoothed = Some(blended);

        Remaining::Estimated(Duration::from_secs_f64(blended.max(0.0)))
    }

    /// Current estimate without feeding a sample.
    ///
    /// Indeterminate when nothing useful has been sampled yet, or when the
    /// last sample is older than `stale_after`.
    pub fn remaining(&self, now: Instant) -> Remaining {
        let (Some(last), Some(secs)) = (self.last_sample_at, self.smoothed) else {
            return Remaining::Indeterminate;
        };

        if self.paused_since.is_none()
            && now.saturating_duration_since(last) > self.config.stale_after
        {
            return Remaining::Indeterminate;
        }

        Remaining::Estimated(Duration::from_secs_f64(secs.max(0.0)))
    }
}
