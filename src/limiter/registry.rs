/*!
 * Process Registry
 * Mutex-guarded map of managed processes
 *
 * The mutex is the only synchronization point between callers and the
 * scheduler thread. Its condition variable lets the scheduler sleep with the
 * lock released and be woken early by adds and by shutdown.
 */

use super::entry::{ManagedProcess, ProcessStats};
use crate::control::ProcessController;
use crate::core::errors::{LimiterError, LimiterResult};
use crate::core::types::Pid;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

pub(crate) type Entries<H> = HashMap<Pid, ManagedProcess<H>>;

/// Managed processes keyed by PID
pub struct ProcessRegistry<H> {
    entries: Mutex<Entries<H>>,
    wakeup: Condvar,
}

impl<H> ProcessRegistry<H> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            wakeup: Condvar::new(),
        }
    }

    /// Start managing `pid`
    ///
    /// Rejected without any mutation if the PID is already managed or no
    /// handle can be acquired. The new entry is Running and due immediately.
    pub fn add<C>(
        &self,
        controller: &C,
        pid: Pid,
        percentage: u32,
        cycle_length: Duration,
    ) -> LimiterResult<()>
    where
        C: ProcessController<Handle = H>,
    {
        let mut entries = self.entries.lock();
        if entries.contains_key(&pid) {
            return Err(LimiterError::AlreadyManaged(pid));
        }

        let handle = controller
            .open(pid)
            .map_err(|reason| LimiterError::AcquisitionFailed { pid, reason })?;

        let entry = ManagedProcess::new(pid, handle, percentage, cycle_length, Instant::now());
        debug!(
            pid,
            suspend_ms = entry.duty().suspend().as_millis() as u64,
            resume_ms = entry.duty().resume().as_millis() as u64,
            "Registered process"
        );
        entries.insert(pid, entry);
        drop(entries);

        self.wakeup.notify_all();
        Ok(())
    }

    /// Stop managing `pid`, resuming it first if suspended
    ///
    /// Returns false if the PID was not managed.
    pub fn remove<C>(&self, controller: &C, pid: Pid) -> bool
    where
        C: ProcessController<Handle = H>,
    {
        let mut entries = self.entries.lock();
        match entries.remove(&pid) {
            Some(entry) => {
                entry.release(controller);
                true
            }
            None => false,
        }
    }

    /// Resume and release every entry, leaving the registry empty
    ///
    /// Returns the number of entries released.
    pub fn drain_all<C>(&self, controller: &C) -> usize
    where
        C: ProcessController<Handle = H>,
    {
        let mut entries = self.entries.lock();
        let count = entries.len();
        for (_, entry) in entries.drain() {
            entry.release(controller);
        }
        count
    }

    /// Managed PIDs, at most `capacity` of them, in no particular order
    pub fn snapshot_ids(&self, capacity: usize) -> Vec<Pid> {
        self.entries.lock().keys().take(capacity).copied().collect()
    }

    /// Change the throttle of a managed process
    pub fn set_percentage(&self, pid: Pid, percentage: u32) -> bool {
        match self.entries.lock().get_mut(&pid) {
            Some(entry) => {
                entry.set_percentage(percentage);
                true
            }
            None => false,
        }
    }

    pub fn stats(&self, pid: Pid) -> Option<ProcessStats> {
        let now = Instant::now();
        self.entries.lock().get(&pid).map(|entry| entry.stats(now))
    }

    pub fn all_stats(&self) -> Vec<ProcessStats> {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .map(|entry| entry.stats(now))
            .collect()
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.entries.lock().contains_key(&pid)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Entries<H>> {
        self.entries.lock()
    }

    /// Sleep with the lock released until `deadline` or a notification
    pub(crate) fn wait_until(&self, entries: &mut MutexGuard<'_, Entries<H>>, deadline: Instant) {
        self.wakeup.wait_until(entries, deadline);
    }

    /// Wake the scheduler if it is sleeping
    pub(crate) fn notify(&self) {
        // Taking the lock orders this after any check the scheduler is
        // making, so the wakeup cannot be lost.
        let _entries = self.entries.lock();
        self.wakeup.notify_all();
    }
}

impl<H> Default for ProcessRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}
