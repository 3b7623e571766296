/*!
 * Limiter Configuration
 *
 * Duty-cycle timing parameters with environment overrides
 */

use super::errors::{LimiterError, LimiterResult};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::time::Duration;

/// Default length of one suspend+resume cycle
pub const DEFAULT_CYCLE_LENGTH: Duration = Duration::from_millis(200);

/// Sleep used while no process is registered
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_millis(100);

/// Longest the scheduler sleeps between evaluations
pub const DEFAULT_MAX_WAKEUP_INTERVAL: Duration = Duration::from_millis(500);

/// Shortest the scheduler sleeps between evaluations
pub const DEFAULT_MIN_WAKEUP_INTERVAL: Duration = Duration::from_millis(1);

/// Spacing between resume attempts for a process whose resume keeps failing
pub const DEFAULT_RESUME_RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// Smallest cycle that still leaves 1 ms for each phase
pub const MIN_CYCLE_LENGTH: Duration = Duration::from_millis(2);

/// Timing configuration for the duty-cycle scheduler
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct LimiterConfig {
    /// Default cycle length for newly added processes
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub cycle_length: Duration,
    /// Sleep while the registry is empty
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub idle_interval: Duration,
    /// Upper cap on a single scheduler sleep
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub max_wakeup_interval: Duration,
    /// Lower floor on a single scheduler sleep
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub min_wakeup_interval: Duration,
    /// Delay before retrying a failed resume
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub resume_retry_interval: Duration,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            cycle_length: DEFAULT_CYCLE_LENGTH,
            idle_interval: DEFAULT_IDLE_INTERVAL,
            max_wakeup_interval: DEFAULT_MAX_WAKEUP_INTERVAL,
            min_wakeup_interval: DEFAULT_MIN_WAKEUP_INTERVAL,
            resume_retry_interval: DEFAULT_RESUME_RETRY_INTERVAL,
        }
    }
}

impl LimiterConfig {
    /// Load configuration from the environment on top of the defaults
    ///
    /// Environment variables (all in milliseconds):
    /// - LIMITER_CYCLE_MS
    /// - LIMITER_IDLE_MS
    /// - LIMITER_MAX_WAKEUP_MS
    /// - LIMITER_MIN_WAKEUP_MS
    /// - LIMITER_RESUME_RETRY_MS
    pub fn from_env() -> LimiterResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a caller-provided lookup
    pub fn from_lookup<F>(lookup: F) -> LimiterResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let read = |key: &str, slot: &mut Duration| -> LimiterResult<()> {
            if let Some(raw) = lookup(key) {
                let ms: u64 = raw.trim().parse().map_err(|_| {
                    LimiterError::InvalidConfig(format!("{key} must be milliseconds, got {raw:?}"))
                })?;
                *slot = Duration::from_millis(ms);
            }
            Ok(())
        };

        read("LIMITER_CYCLE_MS", &mut config.cycle_length)?;
        read("LIMITER_IDLE_MS", &mut config.idle_interval)?;
        read("LIMITER_MAX_WAKEUP_MS", &mut config.max_wakeup_interval)?;
        read("LIMITER_MIN_WAKEUP_MS", &mut config.min_wakeup_interval)?;
        read("LIMITER_RESUME_RETRY_MS", &mut config.resume_retry_interval)?;

        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_cycle_length(mut self, cycle_length: Duration) -> Self {
        self.cycle_length = cycle_length;
        self
    }

    #[must_use]
    pub fn with_idle_interval(mut self, idle_interval: Duration) -> Self {
        self.idle_interval = idle_interval;
        self
    }

    #[must_use]
    pub fn with_resume_retry_interval(mut self, resume_retry_interval: Duration) -> Self {
        self.resume_retry_interval = resume_retry_interval;
        self
    }

    #[must_use]
    pub fn with_max_wakeup_interval(mut self, max_wakeup_interval: Duration) -> Self {
        self.max_wakeup_interval = max_wakeup_interval;
        self
    }

    /// Reject configurations the scheduler cannot honor
    pub fn validate(&self) -> LimiterResult<()> {
        validate_cycle_length(self.cycle_length)?;

        if self.idle_interval.is_zero() {
            return Err(LimiterError::InvalidConfig(
                "idle_interval must be non-zero".into(),
            ));
        }
        if self.min_wakeup_interval.is_zero() {
            return Err(LimiterError::InvalidConfig(
                "min_wakeup_interval must be non-zero".into(),
            ));
        }
        if self.resume_retry_interval < self.min_wakeup_interval {
            return Err(LimiterError::InvalidConfig(format!(
                "resume_retry_interval ({:?}) is below min_wakeup_interval ({:?})",
                self.resume_retry_interval, self.min_wakeup_interval
            )));
        }
        if self.max_wakeup_interval < self.min_wakeup_interval {
            return Err(LimiterError::InvalidConfig(format!(
                "max_wakeup_interval ({:?}) is below min_wakeup_interval ({:?})",
                self.max_wakeup_interval, self.min_wakeup_interval
            )));
        }
        Ok(())
    }
}

/// Check a per-process cycle length
pub fn validate_cycle_length(cycle_length: Duration) -> LimiterResult<()> {
    if cycle_length < MIN_CYCLE_LENGTH {
        return Err(LimiterError::InvalidConfig(format!(
            "cycle_length must be at least {:?}, got {:?}",
            MIN_CYCLE_LENGTH, cycle_length
        )));
    }
    Ok(())
}
