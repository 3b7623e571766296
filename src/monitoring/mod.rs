/*!
 * Monitoring Module
 * Event stream and tracing setup
 */

pub mod events;
pub mod tracer;

pub use events::{EventBus, LimiterEvent};
pub use tracer::init_tracing;
