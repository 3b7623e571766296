/*!
 * Core Types
 * Common types used across the limiter
 */

use serde::{Deserialize, Serialize};

/// OS process identifier
pub type Pid = u32;

/// Upper bound of a throttle percentage
pub const MAX_PERCENTAGE: u32 = 100;

/// Clamp a caller-supplied throttle percentage into `[0, 100]`
///
/// The percentage is the share of each cycle the target spends suspended,
/// so 90 leaves the process roughly 10% of its unthrottled CPU time.
#[inline]
#[must_use]
pub const fn clamp_percentage(percentage: u32) -> u32 {
    if percentage > MAX_PERCENTAGE {
        MAX_PERCENTAGE
    } else {
        percentage
    }
}

/// Duty-cycle phase of a managed process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Process is executing normally
    Running,
    /// Process has been stopped by the limiter
    Suspended,
}

impl Phase {
    #[inline(always)]
    #[must_use]
    pub const fn is_suspended(self) -> bool {
        matches!(self, Phase::Suspended)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Phase::Running => write!(f, "running"),
            Phase::Suspended => write!(f, "suspended"),
        }
    }
}
