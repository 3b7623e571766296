/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::types::Pid;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for process-control backend operations
pub type ControlResult<T> = Result<T, ControlError>;

/// Result type for limiter operations
pub type LimiterResult<T> = Result<T, LimiterError>;

/// Errors reported by a process-control backend
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ControlError {
    #[error("Process {0} not found")]
    #[diagnostic(
        code(control::not_found),
        help("The process has exited or the PID was never valid.")
    )]
    NotFound(Pid),

    #[error("Permission denied for process {0}")]
    #[diagnostic(
        code(control::permission_denied),
        help("Run with elevated privileges or target processes owned by the current user.")
    )]
    PermissionDenied(Pid),

    #[error("Process control not supported: {0}")]
    #[diagnostic(
        code(control::unsupported),
        help("This platform has no suspend/resume primitive available to the limiter.")
    )]
    Unsupported(String),

    #[error("OS error for process {pid}: {message}")]
    #[diagnostic(code(control::os_error))]
    Os { pid: Pid, message: String },
}

#[cfg(unix)]
impl ControlError {
    /// Map an errno from a signal or pidfd call on `pid`
    pub(crate) fn from_errno(pid: Pid, errno: nix::errno::Errno) -> Self {
        use nix::errno::Errno;
        match errno {
            Errno::ESRCH => ControlError::NotFound(pid),
            Errno::EPERM | Errno::EACCES => ControlError::PermissionDenied(pid),
            Errno::ENOSYS => ControlError::Unsupported(errno.desc().to_string()),
            other => ControlError::Os {
                pid,
                message: other.desc().to_string(),
            },
        }
    }
}

/// Limiter-level errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum LimiterError {
    #[error("Limiter is not running")]
    #[diagnostic(
        code(limiter::not_running),
        help("Call start() before adding processes.")
    )]
    NotRunning,

    #[error("Process {0} is already managed")]
    #[diagnostic(
        code(limiter::already_managed),
        help("Use set_limit() to change the throttle of a managed process.")
    )]
    AlreadyManaged(Pid),

    #[error("Process {0} is not managed")]
    #[diagnostic(code(limiter::not_managed))]
    NotManaged(Pid),

    #[error("Could not acquire a handle to process {pid}: {reason}")]
    #[diagnostic(
        code(limiter::acquisition_failed),
        help("The process may have exited, or the limiter lacks the privilege to control it.")
    )]
    AcquisitionFailed { pid: Pid, reason: ControlError },

    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(limiter::invalid_config),
        help("Review the cycle length and wakeup intervals.")
    )]
    InvalidConfig(String),

    #[error("Failed to spawn scheduler thread: {0}")]
    #[diagnostic(code(limiter::spawn_failed))]
    SpawnFailed(String),
}
