/*!
 * Limiter Module
 * Duty-cycle throttling of external processes
 */

mod builder;
mod entry;
mod manager;
mod registry;
mod scheduler;

pub use builder::LimiterBuilder;
pub use entry::{DutyCycle, ProcessStats};
pub use manager::Limiter;
pub use registry::ProcessRegistry;
