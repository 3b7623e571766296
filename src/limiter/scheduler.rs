/*!
 * Duty-Cycle Scheduler
 *
 * Single background loop that drives every managed process through its
 * Running/Suspended cycle. It is the only caller of suspend/resume during
 * normal operation and the only writer of phase and deadline fields.
 */

use super::registry::{Entries, ProcessRegistry};
use crate::control::ProcessController;
use crate::core::config::LimiterConfig;
use crate::core::errors::ControlError;
use crate::core::types::{Phase, Pid};
use crate::monitoring::{EventBus, LimiterEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// State shared between the limiter handle and its scheduler thread
pub(crate) struct Shared<C: ProcessController> {
    pub controller: C,
    pub registry: ProcessRegistry<C::Handle>,
    pub config: LimiterConfig,
    pub events: EventBus,
    pub stop: AtomicBool,
}

impl<C: ProcessController> Shared<C> {
    pub fn new(controller: C, config: LimiterConfig) -> Self {
        Self {
            controller,
            registry: ProcessRegistry::new(),
            config,
            events: EventBus::new(),
            stop: AtomicBool::new(false),
        }
    }
}

/// Why an entry leaves the registry during a tick
#[derive(Debug)]
enum Eviction {
    Exited,
    Unsupported(ControlError),
}

/// Background loop over the shared registry
pub(crate) struct DutyCycleScheduler<C: ProcessController> {
    shared: Arc<Shared<C>>,
}

impl<C: ProcessController> DutyCycleScheduler<C> {
    pub fn new(shared: Arc<Shared<C>>) -> Self {
        Self { shared }
    }

    /// Run until the stop flag is observed
    ///
    /// The registry lock is held while evaluating and released while
    /// sleeping. Stop and add both notify the condition variable, so neither
    /// waits for the computed sleep to run out.
    pub fn run(self) {
        let shared = &*self.shared;
        let config = &shared.config;
        info!(
            platform = %shared.controller.platform(),
            cycle_ms = config.cycle_length.as_millis() as u64,
            "Duty-cycle scheduler started"
        );

        let mut entries = shared.registry.lock();
        loop {
            if shared.stop.load(Ordering::Acquire) {
                break;
            }

            if entries.is_empty() {
                let deadline = Instant::now() + config.idle_interval;
                shared.registry.wait_until(&mut entries, deadline);
                continue;
            }

            let now = Instant::now();
            let earliest = evaluate(
                &mut entries,
                &shared.controller,
                &shared.events,
                now,
                config.resume_retry_interval,
            );
            let wakeup = next_wakeup(now, earliest, config);

            trace!(
                managed = entries.len(),
                sleep_us = wakeup.saturating_duration_since(now).as_micros() as u64,
                "Scheduler tick complete"
            );
            shared.registry.wait_until(&mut entries, wakeup);
        }
        drop(entries);

        info!("Duty-cycle scheduler stopped");
    }
}

/// One pass over every entry
///
/// Dead processes are dropped without a resume, processes whose suspend is
/// refused are dropped for good, due entries flip phase. A failed resume
/// leaves the entry Suspended with its deadline untouched; it is retried no
/// sooner than `retry_after` later. Only the first failure of a streak is
/// reported as an event. Returns the earliest remaining wakeup.
pub(crate) fn evaluate<C>(
    entries: &mut Entries<C::Handle>,
    controller: &C,
    events: &EventBus,
    now: Instant,
    retry_after: Duration,
) -> Option<Instant>
where
    C: ProcessController,
{
    let mut earliest: Option<Instant> = None;
    let mut dropped: Vec<(Pid, Eviction)> = Vec::new();

    for entry in entries.values_mut() {
        if !controller.is_alive(entry.handle()) {
            dropped.push((entry.pid, Eviction::Exited));
            continue;
        }

        if entry.is_due(now) {
            match entry.phase {
                Phase::Running => match controller.suspend(entry.handle()) {
                    Ok(()) => {
                        entry.mark_suspended(now);
                        trace!(pid = entry.pid, "Suspended");
                    }
                    Err(ControlError::NotFound(_)) => {
                        dropped.push((entry.pid, Eviction::Exited));
                        continue;
                    }
                    Err(e) => {
                        dropped.push((entry.pid, Eviction::Unsupported(e)));
                        continue;
                    }
                },
                Phase::Suspended => match controller.resume(entry.handle()) {
                    Ok(()) => {
                        entry.mark_resumed(now);
                        trace!(pid = entry.pid, "Resumed");
                    }
                    Err(ControlError::NotFound(_)) => {
                        dropped.push((entry.pid, Eviction::Exited));
                        continue;
                    }
                    Err(e) => {
                        let streak = entry.mark_resume_failed(now, retry_after);
                        if streak == 1 {
                            warn!(pid = entry.pid, error = %e, "Resume failed, will retry");
                            events.emit(LimiterEvent::ResumeFailed {
                                pid: entry.pid,
                                reason: e,
                            });
                        } else {
                            debug!(pid = entry.pid, streak, error = %e, "Resume still failing");
                        }
                    }
                },
            }
        }

        let wake = entry.wake_at();
        earliest = Some(earliest.map_or(wake, |t| t.min(wake)));
    }

    for (pid, reason) in dropped {
        let Some(entry) = entries.remove(&pid) else {
            continue;
        };
        match reason {
            Eviction::Exited => {
                info!(pid, "Managed process exited, releasing handle");
                // Gone already: nothing to resume.
                drop(entry);
                events.emit(LimiterEvent::Exited { pid });
            }
            Eviction::Unsupported(e) => {
                warn!(pid, error = %e, "Suspend refused, dropping process");
                entry.release(controller);
                events.emit(LimiterEvent::Unsupported { pid, reason: e });
            }
        }
    }

    if entries.is_empty() {
        debug!("Registry empty after tick");
    }
    earliest
}

/// Clamp the earliest deadline into the configured wakeup window
pub(crate) fn next_wakeup(now: Instant, earliest: Option<Instant>, config: &LimiterConfig) -> Instant {
    let ceiling = now + config.max_wakeup_interval;
    let floor = now + config.min_wakeup_interval;
    earliest.map_or(ceiling, |t| t.min(ceiling)).max(floor)
}
