/*!
 * Simulated Process Control
 * In-memory backend for deterministic tests and dry runs
 */

use super::traits::ProcessController;
use super::types::PlatformType;
use crate::core::errors::{ControlError, ControlResult};
use crate::core::types::Pid;
use ahash::RandomState;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Observable state of a simulated process
#[derive(Debug, Clone, Serialize)]
pub struct SimProcessState {
    pub alive: bool,
    pub suspended: bool,
    /// Whether suspend requests are honored
    pub suspendable: bool,
    /// Whether a handle can be opened
    pub openable: bool,
    /// Remaining resume calls that will fail before one succeeds
    pub pending_resume_failures: u32,
    pub suspend_calls: u32,
    pub resume_calls: u32,
    /// Suspend/resume calls that arrived after the process exited
    pub calls_after_exit: u32,
    pub open_handles: u32,
    pub released_handles: u32,
    #[serde(skip)]
    suspended_since: Option<Instant>,
    pub suspended_total: Duration,
}

impl SimProcessState {
    fn new() -> Self {
        Self {
            alive: true,
            suspended: false,
            suspendable: true,
            openable: true,
            pending_resume_failures: 0,
            suspend_calls: 0,
            resume_calls: 0,
            calls_after_exit: 0,
            open_handles: 0,
            released_handles: 0,
            suspended_since: None,
            suspended_total: Duration::ZERO,
        }
    }

    fn close_interval(&mut self, now: Instant) {
        if let Some(since) = self.suspended_since.take() {
            self.suspended_total += now.saturating_duration_since(since);
        }
    }

    /// Cumulative suspended time, including a suspension still in progress
    pub fn suspended_time(&self) -> Duration {
        match self.suspended_since {
            Some(since) => self.suspended_total + since.elapsed(),
            None => self.suspended_total,
        }
    }
}

type ProcessTable = Arc<DashMap<Pid, SimProcessState, RandomState>>;

/// Handle into the simulated process table
#[derive(Debug)]
pub struct SimHandle {
    pid: Pid,
    processes: ProcessTable,
}

impl SimHandle {
    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }
}

impl Drop for SimHandle {
    fn drop(&mut self) {
        if let Some(mut state) = self.processes.get_mut(&self.pid) {
            state.open_handles = state.open_handles.saturating_sub(1);
            state.released_handles += 1;
        }
    }
}

/// Simulation-based controller
/// Tracks suspend/resume calls instead of touching real processes
pub struct SimulatedController {
    processes: ProcessTable,
}

impl SimulatedController {
    pub fn new() -> Self {
        info!("Process controller initialized (simulation mode)");
        Self {
            processes: Arc::new(DashMap::with_hasher(RandomState::new())),
        }
    }

    /// Register a live, running process
    pub fn spawn(&self, pid: Pid) {
        self.processes.insert(pid, SimProcessState::new());
    }

    /// Mark a process as exited
    pub fn exit(&self, pid: Pid) {
        if let Some(mut state) = self.processes.get_mut(&pid) {
            state.alive = false;
            state.close_interval(Instant::now());
        }
    }

    /// Refuse handle acquisition for a process
    pub fn deny_open(&self, pid: Pid) {
        if let Some(mut state) = self.processes.get_mut(&pid) {
            state.openable = false;
        }
    }

    /// Refuse every suspend request for a process
    pub fn make_unsuspendable(&self, pid: Pid) {
        if let Some(mut state) = self.processes.get_mut(&pid) {
            state.suspendable = false;
        }
    }

    /// Fail the next `count` resume requests for a process
    pub fn fail_resumes(&self, pid: Pid, count: u32) {
        if let Some(mut state) = self.processes.get_mut(&pid) {
            state.pending_resume_failures = count;
        }
    }

    /// Snapshot of a process's simulated state
    pub fn state(&self, pid: Pid) -> Option<SimProcessState> {
        self.processes.get(&pid).map(|r| r.value().clone())
    }

    pub fn is_suspended(&self, pid: Pid) -> bool {
        self.processes.get(&pid).is_some_and(|r| r.suspended)
    }

    pub fn open_handles(&self, pid: Pid) -> u32 {
        self.processes.get(&pid).map_or(0, |r| r.open_handles)
    }
}

impl Default for SimulatedController {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SimulatedController {
    fn clone(&self) -> Self {
        Self {
            processes: Arc::clone(&self.processes),
        }
    }
}

impl ProcessController for SimulatedController {
    type Handle = SimHandle;

    fn open(&self, pid: Pid) -> ControlResult<SimHandle> {
        let mut state = self
            .processes
            .get_mut(&pid)
            .ok_or(ControlError::NotFound(pid))?;

        if !state.alive {
            return Err(ControlError::NotFound(pid));
        }
        if !state.openable {
            return Err(ControlError::PermissionDenied(pid));
        }

        state.open_handles += 1;
        Ok(SimHandle {
            pid,
            processes: Arc::clone(&self.processes),
        })
    }

    fn suspend(&self, handle: &SimHandle) -> ControlResult<()> {
        let mut state = self
            .processes
            .get_mut(&handle.pid)
            .ok_or(ControlError::NotFound(handle.pid))?;

        state.suspend_calls += 1;
        if !state.alive {
            state.calls_after_exit += 1;
            return Err(ControlError::NotFound(handle.pid));
        }
        if !state.suspendable {
            return Err(ControlError::PermissionDenied(handle.pid));
        }

        if !state.suspended {
            state.suspended = true;
            state.suspended_since = Some(Instant::now());
        }
        Ok(())
    }

    fn resume(&self, handle: &SimHandle) -> ControlResult<()> {
        let mut state = self
            .processes
            .get_mut(&handle.pid)
            .ok_or(ControlError::NotFound(handle.pid))?;

        state.resume_calls += 1;
        if !state.alive {
            state.calls_after_exit += 1;
            return Err(ControlError::NotFound(handle.pid));
        }
        if state.pending_resume_failures > 0 {
            state.pending_resume_failures -= 1;
            return Err(ControlError::Os {
                pid: handle.pid,
                message: "simulated resume failure".into(),
            });
        }

        if state.suspended {
            state.suspended = false;
            state.close_interval(Instant::now());
        }
        Ok(())
    }

    fn is_alive(&self, handle: &SimHandle) -> bool {
        self.processes.get(&handle.pid).is_some_and(|r| r.alive)
    }

    fn is_supported(&self) -> bool {
        true // Always available
    }

    fn platform(&self) -> PlatformType {
        PlatformType::Simulation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_release_on_drop() {
        let controller = SimulatedController::new();
        controller.spawn(10);

        let handle = controller.open(10).unwrap();
        assert_eq!(controller.open_handles(10), 1);

        drop(handle);
        let state = controller.state(10).unwrap();
        assert_eq!(state.open_handles, 0);
        assert_eq!(state.released_handles, 1);
    }

    #[test]
    fn test_suspend_resume_cycle() {
        let controller = SimulatedController::new();
        controller.spawn(11);
        let handle = controller.open(11).unwrap();

        controller.suspend(&handle).unwrap();
        assert!(controller.is_suspended(11));

        controller.resume(&handle).unwrap();
        assert!(!controller.is_suspended(11));

        // Resuming a running process is harmless.
        controller.resume(&handle).unwrap();
        assert_eq!(controller.state(11).unwrap().resume_calls, 2);
    }

    #[test]
    fn test_injected_failures() {
        let controller = SimulatedController::new();
        controller.spawn(12);
        controller.spawn(13);
        controller.deny_open(13);

        assert_eq!(
            controller.open(13).unwrap_err(),
            ControlError::PermissionDenied(13)
        );
        assert_eq!(controller.open(99).unwrap_err(), ControlError::NotFound(99));

        let handle = controller.open(12).unwrap();
        controller.make_unsuspendable(12);
        assert!(controller.suspend(&handle).is_err());

        controller.exit(12);
        assert!(!controller.is_alive(&handle));
        assert!(controller.resume(&handle).is_err());
        assert_eq!(controller.state(12).unwrap().calls_after_exit, 1);
    }
}
