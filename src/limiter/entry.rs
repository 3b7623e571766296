/*!
 * Managed Process Entry
 * Per-target duty-cycle state and handle ownership
 */

use crate::control::ProcessController;
use crate::core::types::{clamp_percentage, Phase, Pid};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const MIN_PHASE_MS: u128 = 1;

/// Split of one cycle into suspended and running time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyCycle {
    suspend: Duration,
    resume: Duration,
}

impl DutyCycle {
    /// Derive the split from a throttle percentage
    ///
    /// Works at millisecond granularity. Each phase is at least 1 ms and
    /// the two always add up to the cycle length (for cycles of 2 ms or more).
    #[must_use]
    pub fn new(percentage: u32, cycle_length: Duration) -> Self {
        let percentage = u128::from(clamp_percentage(percentage));
        let cycle_ms = cycle_length.as_millis().max(2 * MIN_PHASE_MS);

        let suspend_ms = ((cycle_ms * percentage + 50) / 100).clamp(MIN_PHASE_MS, cycle_ms - MIN_PHASE_MS);
        let resume_ms = cycle_ms - suspend_ms;

        Self {
            suspend: millis(suspend_ms),
            resume: millis(resume_ms),
        }
    }

    /// Time spent suspended per cycle
    #[inline]
    pub fn suspend(&self) -> Duration {
        self.suspend
    }

    /// Time spent running per cycle
    #[inline]
    pub fn resume(&self) -> Duration {
        self.resume
    }

    #[inline]
    pub fn cycle_length(&self) -> Duration {
        self.suspend + self.resume
    }
}

fn millis(ms: u128) -> Duration {
    Duration::from_millis(u64::try_from(ms).unwrap_or(u64::MAX))
}

/// Point-in-time statistics for a managed process
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProcessStats {
    pub pid: Pid,
    pub percentage: u32,
    pub phase: Phase,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub suspend_duration: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub resume_duration: Duration,
    pub suspend_count: u64,
    pub resume_count: u64,
    pub resume_failures: u64,
    /// Cumulative time spent suspended, including the current suspension
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub time_suspended: Duration,
    /// Time since the process was added
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub managed_for: Duration,
}

/// Registry entry for one throttled process
///
/// Owns the process handle; the handle is released when the entry is dropped.
#[derive(Debug)]
pub(crate) struct ManagedProcess<H> {
    pub pid: Pid,
    handle: H,
    percentage: u32,
    cycle_length: Duration,
    duty: DutyCycle,
    pub phase: Phase,
    pub next_transition: Instant,
    retry_at: Option<Instant>,
    failure_streak: u32,
    added_at: Instant,
    suspended_at: Option<Instant>,
    suspended_total: Duration,
    suspend_count: u64,
    resume_count: u64,
    resume_failures: u64,
}

impl<H> ManagedProcess<H> {
    /// New entry, Running and due for its first transition immediately
    pub fn new(pid: Pid, handle: H, percentage: u32, cycle_length: Duration, now: Instant) -> Self {
        let percentage = clamp_percentage(percentage);
        Self {
            pid,
            handle,
            percentage,
            cycle_length,
            duty: DutyCycle::new(percentage, cycle_length),
            phase: Phase::Running,
            next_transition: now,
            retry_at: None,
            failure_streak: 0,
            added_at: now,
            suspended_at: None,
            suspended_total: Duration::ZERO,
            suspend_count: 0,
            resume_count: 0,
            resume_failures: 0,
        }
    }

    #[inline]
    pub fn handle(&self) -> &H {
        &self.handle
    }

    #[inline]
    pub fn duty(&self) -> DutyCycle {
        self.duty
    }

    #[inline]
    pub fn percentage(&self) -> u32 {
        self.percentage
    }

    /// Recompute the duty cycle; phase and deadline stay as they are
    pub fn set_percentage(&mut self, percentage: u32) {
        self.percentage = clamp_percentage(percentage);
        self.duty = DutyCycle::new(self.percentage, self.cycle_length);
    }

    /// Record a successful suspend at `now`
    pub fn mark_suspended(&mut self, now: Instant) {
        self.phase = Phase::Suspended;
        self.next_transition = now + self.duty.suspend;
        self.suspended_at = Some(now);
        self.suspend_count += 1;
    }

    /// Record a successful resume at `now`
    pub fn mark_resumed(&mut self, now: Instant) {
        self.phase = Phase::Running;
        self.next_transition = now + self.duty.resume;
        if let Some(since) = self.suspended_at.take() {
            self.suspended_total += now.saturating_duration_since(since);
        }
        self.resume_count += 1;
        self.retry_at = None;
        self.failure_streak = 0;
    }

    /// Record a failed resume at `now`
    ///
    /// The entry stays Suspended and keeps its deadline; the next attempt is
    /// held back until `now + retry_after`. Returns how many resumes in a row
    /// have now failed.
    pub fn mark_resume_failed(&mut self, now: Instant, retry_after: Duration) -> u32 {
        self.resume_failures += 1;
        self.failure_streak = self.failure_streak.saturating_add(1);
        self.retry_at = Some(now + retry_after);
        self.failure_streak
    }

    /// Whether the entry should transition at `now`
    #[inline]
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_transition && self.retry_at.map_or(true, |at| now >= at)
    }

    /// Earliest instant at which the entry can next transition
    #[inline]
    pub fn wake_at(&self) -> Instant {
        self.retry_at
            .map_or(self.next_transition, |at| at.max(self.next_transition))
    }

    pub fn stats(&self, now: Instant) -> ProcessStats {
        let in_progress = self
            .suspended_at
            .map_or(Duration::ZERO, |since| now.saturating_duration_since(since));

        ProcessStats {
            pid: self.pid,
            percentage: self.percentage,
            phase: self.phase,
            suspend_duration: self.duty.suspend,
            resume_duration: self.duty.resume,
            suspend_count: self.suspend_count,
            resume_count: self.resume_count,
            resume_failures: self.resume_failures,
            time_suspended: self.suspended_total + in_progress,
            managed_for: now.saturating_duration_since(self.added_at),
        }
    }

    /// Return the process to Running if needed, then release the handle
    pub fn release<C>(self, controller: &C)
    where
        C: ProcessController<Handle = H>,
    {
        if self.phase.is_suspended() {
            match controller.resume(&self.handle) {
                Ok(()) => debug!(pid = self.pid, "Resumed process before release"),
                Err(e) => warn!(pid = self.pid, error = %e, "Failed to resume process before release"),
            }
        }
        // Dropping self releases the handle.
    }
}
