/*!
 * Limiter
 * Context object owning the registry, the backend, and the scheduler thread
 */

use super::builder::LimiterBuilder;
use super::entry::ProcessStats;
use super::scheduler::{DutyCycleScheduler, Shared};
use crate::control::{PlatformController, PlatformType, ProcessController};
use crate::core::config::{validate_cycle_length, LimiterConfig};
use crate::core::errors::{LimiterError, LimiterResult};
use crate::core::types::{clamp_percentage, Pid};
use crate::monitoring::LimiterEvent;
use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const SCHEDULER_THREAD_NAME: &str = "duty-cycle";

/// CPU limiter for externally chosen processes
///
/// Lifecycle: create with [`Limiter::new`] or [`Limiter::builder`], then
/// [`start`](Self::start), [`stop`](Self::stop), and drop. Dropping a running
/// limiter stops it, so no target is left suspended.
///
/// # Example
///
/// ```no_run
/// use duty_cycle_limiter::Limiter;
///
/// let limiter = Limiter::new();
/// limiter.start();
/// limiter.add_process(4242, 90); // suspended 90% of every cycle
/// limiter.stop();
/// ```
pub struct Limiter<C: ProcessController = PlatformController> {
    shared: Arc<Shared<C>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Limiter<PlatformController> {
    /// Limiter on the platform backend with default timing
    pub fn new() -> Self {
        Self::from_parts(PlatformController::default(), LimiterConfig::default())
    }

    pub fn builder() -> LimiterBuilder<PlatformController> {
        LimiterBuilder::new()
    }
}

impl Default for Limiter<PlatformController> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ProcessController> Limiter<C> {
    /// Limiter on a specific backend
    pub fn with_controller(controller: C, config: LimiterConfig) -> LimiterResult<Self> {
        config.validate()?;
        Ok(Self::from_parts(controller, config))
    }

    pub(crate) fn from_parts(controller: C, config: LimiterConfig) -> Self {
        info!(
            platform = %controller.platform(),
            cycle_ms = config.cycle_length.as_millis() as u64,
            "Limiter initialized"
        );
        Self {
            shared: Arc::new(Shared::new(controller, config)),
            worker: Mutex::new(None),
        }
    }

    /// Launch the scheduler thread
    ///
    /// Idempotent. Fails silently (logged, returns false) when the backend is
    /// unsupported or the thread cannot be spawned; no process is accepted
    /// until a start succeeds.
    pub fn start(&self) -> bool {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return true;
        }

        let controller = &self.shared.controller;
        if !controller.is_supported() {
            warn!(platform = %controller.platform(), "Process control unavailable, limiter not started");
            return false;
        }
        if let Err(e) = controller.init() {
            warn!(error = %e, "Privilege setup failed, continuing");
        }

        self.shared.stop.store(false, Ordering::Release);
        let scheduler = DutyCycleScheduler::new(Arc::clone(&self.shared));
        let spawned = thread::Builder::new()
            .name(SCHEDULER_THREAD_NAME.into())
            .spawn(move || scheduler.run());

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                self.shared.events.emit(LimiterEvent::Started {
                    platform: controller.platform(),
                });
                true
            }
            Err(e) => {
                let err = LimiterError::SpawnFailed(e.to_string());
                error!(error = %err, "Limiter not started");
                false
            }
        }
    }

    /// Stop the scheduler and release every target
    ///
    /// Idempotent. When this returns, every process that was suspended has
    /// been resumed and every handle released.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        let Some(handle) = worker.take() else {
            return;
        };

        self.shared.stop.store(true, Ordering::Release);
        self.shared.registry.notify();

        if handle.join().is_err() {
            error!("Scheduler thread panicked");
        }

        let released = self.shared.registry.drain_all(&self.shared.controller);
        self.shared.events.emit(LimiterEvent::Stopped);
        info!(released, "Limiter stopped");
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Start throttling `pid` at the default cycle length
    ///
    /// Fail-silent: returns false for a duplicate PID, a PID whose handle
    /// cannot be acquired, or a stopped limiter. Subscribe to events or use
    /// [`try_add_process`](Self::try_add_process) to tell these apart.
    pub fn add_process(&self, pid: Pid, percentage: u32) -> bool {
        self.try_add_process(pid, percentage).is_ok()
    }

    /// Start throttling `pid`, reporting why it was rejected
    ///
    /// Percentages above 100 are clamped to 100.
    pub fn try_add_process(&self, pid: Pid, percentage: u32) -> LimiterResult<()> {
        self.add_with_cycle(pid, percentage, self.shared.config.cycle_length)
    }

    /// Start throttling `pid` with its own cycle length
    pub fn add_process_with_cycle(
        &self,
        pid: Pid,
        percentage: u32,
        cycle_length: Duration,
    ) -> LimiterResult<()> {
        validate_cycle_length(cycle_length)?;
        self.add_with_cycle(pid, percentage, cycle_length)
    }

    fn add_with_cycle(&self, pid: Pid, percentage: u32, cycle_length: Duration) -> LimiterResult<()> {
        // Holding the worker lock keeps a concurrent stop from draining
        // between the running check and the insert.
        let worker = self.worker.lock();
        if worker.is_none() {
            return Err(LimiterError::NotRunning);
        }

        let percentage = clamp_percentage(percentage);
        let result = self
            .shared
            .registry
            .add(&self.shared.controller, pid, percentage, cycle_length);

        match &result {
            Ok(()) => {
                info!(pid, percentage, "Throttling process");
                self.shared
                    .events
                    .emit(LimiterEvent::Added { pid, percentage });
            }
            Err(LimiterError::AcquisitionFailed { reason, .. }) => {
                debug!(pid, error = %reason, "Could not acquire process handle");
                self.shared.events.emit(LimiterEvent::AcquisitionFailed {
                    pid,
                    reason: reason.clone(),
                });
            }
            Err(e) => debug!(pid, error = %e, "Add rejected"),
        }
        result
    }

    /// Stop throttling `pid`, resuming it if suspended
    ///
    /// Returns false if the PID was not managed.
    pub fn remove_process(&self, pid: Pid) -> bool {
        let removed = self.shared.registry.remove(&self.shared.controller, pid);
        if removed {
            info!(pid, "Stopped throttling process");
            self.shared.events.emit(LimiterEvent::Removed { pid });
        }
        removed
    }

    /// Change the throttle of a managed process
    ///
    /// Takes effect from the next phase transition.
    pub fn set_limit(&self, pid: Pid, percentage: u32) -> bool {
        self.try_set_limit(pid, percentage).is_ok()
    }

    pub fn try_set_limit(&self, pid: Pid, percentage: u32) -> LimiterResult<()> {
        let percentage = clamp_percentage(percentage);
        if !self.shared.registry.set_percentage(pid, percentage) {
            return Err(LimiterError::NotManaged(pid));
        }

        info!(pid, percentage, "Throttle updated");
        self.shared
            .events
            .emit(LimiterEvent::LimitChanged { pid, percentage });
        Ok(())
    }

    /// Managed PIDs, truncated to `capacity`, in no particular order
    pub fn list_managed_ids(&self, capacity: usize) -> Vec<Pid> {
        self.shared.registry.snapshot_ids(capacity)
    }

    pub fn is_managed(&self, pid: Pid) -> bool {
        self.shared.registry.contains(pid)
    }

    pub fn managed_count(&self) -> usize {
        self.shared.registry.len()
    }

    pub fn process_stats(&self, pid: Pid) -> Option<ProcessStats> {
        self.shared.registry.stats(pid)
    }

    pub fn all_stats(&self) -> Vec<ProcessStats> {
        self.shared.registry.all_stats()
    }

    /// Receive lifecycle and failure events from now on
    pub fn subscribe(&self) -> flume::Receiver<LimiterEvent> {
        self.shared.events.subscribe()
    }

    pub fn config(&self) -> &LimiterConfig {
        &self.shared.config
    }

    pub fn controller(&self) -> &C {
        &self.shared.controller
    }

    pub fn platform(&self) -> PlatformType {
        self.shared.controller.platform()
    }
}

impl<C: ProcessController> Drop for Limiter<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{SimulatedController, UnsupportedController};

    fn sim_limiter() -> (SimulatedController, Limiter<SimulatedController>) {
        let controller = SimulatedController::new();
        let limiter = Limiter::with_controller(controller.clone(), LimiterConfig::default()).unwrap();
        (controller, limiter)
    }

    #[test]
    fn test_start_stop_idempotent() {
        let (_, limiter) = sim_limiter();
        assert!(!limiter.is_running());

        assert!(limiter.start());
        assert!(limiter.start());
        assert!(limiter.is_running());

        limiter.stop();
        limiter.stop();
        assert!(!limiter.is_running());

        // Restart after stop works.
        assert!(limiter.start());
    }

    #[test]
    fn test_add_requires_running() {
        let (controller, limiter) = sim_limiter();
        controller.spawn(1);

        assert_eq!(limiter.try_add_process(1, 50), Err(LimiterError::NotRunning));
        assert!(!limiter.add_process(1, 50));
        assert_eq!(controller.open_handles(1), 0);
    }

    #[test]
    fn test_unsupported_backend_never_starts() {
        let limiter =
            Limiter::with_controller(UnsupportedController::new(), LimiterConfig::default()).unwrap();
        assert!(!limiter.start());
        assert!(!limiter.is_running());
        assert!(!limiter.add_process(1, 50));
    }

    #[test]
    fn test_percentage_clamped() {
        let (controller, limiter) = sim_limiter();
        controller.spawn(2);
        limiter.start();

        assert!(limiter.add_process(2, 500));
        assert_eq!(limiter.process_stats(2).unwrap().percentage, 100);

        assert!(limiter.set_limit(2, 250));
        assert_eq!(limiter.process_stats(2).unwrap().percentage, 100);
    }

    #[test]
    fn test_rejects_bad_cycle() {
        let (controller, limiter) = sim_limiter();
        controller.spawn(3);
        limiter.start();

        let result = limiter.add_process_with_cycle(3, 50, Duration::from_millis(1));
        assert!(matches!(result, Err(LimiterError::InvalidConfig(_))));
        assert!(!limiter.is_managed(3));
    }

    #[test]
    fn test_drop_releases_targets() {
        let (controller, limiter) = sim_limiter();
        controller.spawn(4);
        limiter.start();
        assert!(limiter.add_process(4, 50));

        drop(limiter);
        assert_eq!(controller.open_handles(4), 0);
        assert!(!controller.is_suspended(4));
    }
}
