/*!
 * Duty-Cycle Limiter Library
 * Caps the CPU share of external processes by suspending and resuming them
 */

pub mod control;
pub mod core;
pub mod limiter;
pub mod monitoring;

// Re-exports
pub use control::{PlatformController, PlatformType, ProcessController};
pub use crate::core::config::LimiterConfig;
pub use crate::core::errors::{ControlError, ControlResult, LimiterError, LimiterResult};
pub use crate::core::types::{Phase, Pid};
pub use limiter::{DutyCycle, Limiter, LimiterBuilder, ProcessRegistry, ProcessStats};
pub use monitoring::{init_tracing, EventBus, LimiterEvent};
