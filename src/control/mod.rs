/*!
 * Process Control Module
 * Suspend/resume backends with platform-specific implementations
 */

#[cfg(target_os = "linux")]
mod linux;
#[cfg(unix)]
mod signal;
mod simulation;
mod traits;
mod types;
mod unsupported;

#[cfg(target_os = "linux")]
pub use linux::{LinuxController, PidfdHandle};
#[cfg(unix)]
pub use signal::{SignalController, SignalHandle};
pub use simulation::{SimHandle, SimProcessState, SimulatedController};
pub use traits::*;
pub use types::*;
pub use unsupported::UnsupportedController;

/// Best backend for the build target
#[cfg(target_os = "linux")]
pub type PlatformController = LinuxController;

/// Best backend for the build target
#[cfg(all(unix, not(target_os = "linux")))]
pub type PlatformController = SignalController;

/// Best backend for the build target
#[cfg(not(unix))]
pub type PlatformController = UnsupportedController;
