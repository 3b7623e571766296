/*!
 * Process Control Traits
 * Platform-agnostic abstraction over the suspend/resume primitives
 */

use super::types::PlatformType;
use crate::core::errors::ControlResult;
use crate::core::types::Pid;

/// Suspend/resume backend
///
/// Implementations are stateless from the limiter's point of view: every call
/// is independent and only touches the scheduling state of the target.
pub trait ProcessController: Send + Sync + 'static {
    /// Exclusively owned reference to an OS process object
    ///
    /// Dropping the handle releases the OS object. The registry relies on
    /// this to release each handle exactly once.
    type Handle: Send + 'static;

    /// Privilege precondition, run once when the limiter starts
    ///
    /// Failure here is logged and otherwise ignored; individual opens will
    /// fail later if the privilege really is missing.
    fn init(&self) -> ControlResult<()> {
        Ok(())
    }

    /// Acquire a controllable handle for `pid`
    fn open(&self, pid: Pid) -> ControlResult<Self::Handle>;

    /// Pause every thread of the process without terminating it
    ///
    /// An error means the OS refused; it is not worth retrying for this process.
    fn suspend(&self, handle: &Self::Handle) -> ControlResult<()>;

    /// Undo a suspend; a no-op for a process that is already running
    fn resume(&self, handle: &Self::Handle) -> ControlResult<()>;

    /// True until the process has exited
    fn is_alive(&self, handle: &Self::Handle) -> bool;

    /// Check if this backend can work on the current platform
    fn is_supported(&self) -> bool;

    /// Get the platform type
    fn platform(&self) -> PlatformType;
}
