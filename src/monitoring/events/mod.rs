/*!
 * Event System
 * Observable limiter events fanned out to subscribers
 *
 * The caller-facing operations stay fail-silent; subscribers get the
 * distinguishable outcome of every add, removal, and control failure.
 */

use crate::control::PlatformType;
use crate::core::errors::ControlError;
use crate::core::types::Pid;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::trace;

/// Per-subscriber queue depth; events beyond it are dropped for that subscriber
pub const SUBSCRIBER_CAPACITY: usize = 1024;

/// Lifecycle and failure events emitted by the limiter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LimiterEvent {
    /// Scheduler thread launched
    Started { platform: PlatformType },
    /// Scheduler joined and every target released
    Stopped,
    /// Process accepted into the registry
    Added { pid: Pid, percentage: u32 },
    /// Process removed by the caller or by shutdown
    Removed { pid: Pid },
    /// Throttle of a managed process changed
    LimitChanged { pid: Pid, percentage: u32 },
    /// Process exited while managed
    Exited { pid: Pid },
    /// OS refused to suspend the process; it was dropped
    Unsupported { pid: Pid, reason: ControlError },
    /// Resume failed; retried on the next evaluation
    ResumeFailed { pid: Pid, reason: ControlError },
    /// No handle could be acquired; the add was rejected
    AcquisitionFailed { pid: Pid, reason: ControlError },
}

impl LimiterEvent {
    /// PID the event refers to, if any
    pub fn pid(&self) -> Option<Pid> {
        match self {
            LimiterEvent::Started { .. } | LimiterEvent::Stopped => None,
            LimiterEvent::Added { pid, .. }
            | LimiterEvent::Removed { pid }
            | LimiterEvent::LimitChanged { pid, .. }
            | LimiterEvent::Exited { pid }
            | LimiterEvent::Unsupported { pid, .. }
            | LimiterEvent::ResumeFailed { pid, .. }
            | LimiterEvent::AcquisitionFailed { pid, .. } => Some(*pid),
        }
    }
}

/// Fan-out of events to any number of channel subscribers
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<flume::Sender<LimiterEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> flume::Receiver<LimiterEvent> {
        let (tx, rx) = flume::bounded(SUBSCRIBER_CAPACITY);
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver an event to every live subscriber
    ///
    /// Never blocks: a full subscriber misses the event, a disconnected one
    /// is pruned.
    pub fn emit(&self, event: LimiterEvent) {
        let mut subscribers = self.subscribers.lock();
        if subscribers.is_empty() {
            return;
        }

        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(flume::TrySendError::Full(_)) => {
                trace!(?event, "Subscriber queue full, event dropped");
                true
            }
            Err(flume::TrySendError::Disconnected(_)) => false,
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
