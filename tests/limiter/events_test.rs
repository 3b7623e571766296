/*!
 * Event Stream Tests
 */

use super::common::{running_limiter, wait_for};
use duty_cycle_limiter::control::SimulatedController;
use duty_cycle_limiter::{LimiterBuilder, LimiterEvent, PlatformType};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn drain(rx: &flume::Receiver<LimiterEvent>) -> Vec<LimiterEvent> {
    rx.try_iter().collect()
}

#[test]
fn test_lifecycle_events_in_order() {
    let controller = SimulatedController::new();
    controller.spawn(300);
    controller.spawn(301);
    controller.deny_open(301);

    let limiter = LimiterBuilder::new()
        .with_controller(controller.clone())
        .build()
        .unwrap();
    let rx = limiter.subscribe();

    assert!(limiter.start());
    assert!(limiter.add_process(300, 40));
    assert!(!limiter.add_process(301, 40));
    assert!(limiter.set_limit(300, 60));
    assert!(limiter.remove_process(300));
    limiter.stop();

    let events = drain(&rx);
    assert_eq!(events.len(), 6);
    assert_eq!(
        events[0],
        LimiterEvent::Started {
            platform: PlatformType::Simulation
        }
    );
    assert_eq!(events[1], LimiterEvent::Added { pid: 300, percentage: 40 });
    assert!(matches!(
        events[2],
        LimiterEvent::AcquisitionFailed { pid: 301, .. }
    ));
    assert_eq!(events[3], LimiterEvent::LimitChanged { pid: 300, percentage: 60 });
    assert_eq!(events[4], LimiterEvent::Removed { pid: 300 });
    assert_eq!(events[5], LimiterEvent::Stopped);
}

#[test]
fn test_exit_and_unsupported_events() {
    let (controller, limiter) = running_limiter(&[310, 311]);
    let rx = limiter.subscribe();
    controller.make_unsuspendable(311);

    assert!(limiter.add_process(310, 50));
    assert!(limiter.add_process(311, 50));
    assert!(wait_for(Duration::from_secs(1), || controller.is_suspended(310)));
    controller.exit(310);

    assert!(wait_for(Duration::from_secs(2), || limiter.managed_count() == 0));

    let events = drain(&rx);
    assert!(events.contains(&LimiterEvent::Exited { pid: 310 }));
    assert!(events
        .iter()
        .any(|e| matches!(e, LimiterEvent::Unsupported { pid: 311, .. })));
}

#[test]
fn test_dropped_subscriber_does_not_block() {
    let (controller, limiter) = running_limiter(&[320]);
    drop(limiter.subscribe());

    assert!(limiter.add_process(320, 50));
    assert!(limiter.remove_process(320));
    assert_eq!(controller.open_handles(320), 0);
}
