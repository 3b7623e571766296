/*!
 * Limiter Builder
 * Fluent construction with optional backend and timing overrides
 */

use super::manager::Limiter;
use crate::control::{PlatformController, ProcessController};
use crate::core::config::LimiterConfig;
use crate::core::errors::LimiterResult;
use std::time::Duration;

/// Builder for [`Limiter`]
///
/// # Example
///
/// ```
/// use duty_cycle_limiter::{control::SimulatedController, LimiterBuilder};
/// use std::time::Duration;
///
/// let limiter = LimiterBuilder::new()
///     .with_controller(SimulatedController::new())
///     .with_cycle_length(Duration::from_millis(100))
///     .build()
///     .unwrap();
/// assert_eq!(limiter.config().cycle_length, Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct LimiterBuilder<C = PlatformController> {
    controller: Option<C>,
    config: LimiterConfig,
}

impl LimiterBuilder<PlatformController> {
    /// Platform backend, default timing
    pub fn new() -> Self {
        Self {
            controller: None,
            config: LimiterConfig::default(),
        }
    }

    /// Platform backend, timing taken from `LIMITER_*` variables
    pub fn from_env() -> LimiterResult<Self> {
        Ok(Self {
            controller: None,
            config: LimiterConfig::from_env()?,
        })
    }
}

impl Default for LimiterBuilder<PlatformController> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> LimiterBuilder<C> {
    /// Use a specific backend instead of the platform default
    pub fn with_controller<D: ProcessController>(self, controller: D) -> LimiterBuilder<D> {
        LimiterBuilder {
            controller: Some(controller),
            config: self.config,
        }
    }

    pub fn with_config(mut self, config: LimiterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cycle_length(mut self, cycle_length: Duration) -> Self {
        self.config = self.config.with_cycle_length(cycle_length);
        self
    }

    pub fn with_idle_interval(mut self, interval: Duration) -> Self {
        self.config = self.config.with_idle_interval(interval);
        self
    }

    pub fn with_max_wakeup_interval(mut self, interval: Duration) -> Self {
        self.config = self.config.with_max_wakeup_interval(interval);
        self
    }

    pub fn with_resume_retry_interval(mut self, interval: Duration) -> Self {
        self.config = self.config.with_resume_retry_interval(interval);
        self
    }
}

impl<C: ProcessController + Default> LimiterBuilder<C> {
    /// Validate the configuration and construct the limiter
    ///
    /// The limiter is returned stopped; call [`Limiter::start`].
    pub fn build(self) -> LimiterResult<Limiter<C>> {
        self.config.validate()?;
        let controller = self.controller.unwrap_or_default();
        Ok(Limiter::from_parts(controller, self.config))
    }
}
