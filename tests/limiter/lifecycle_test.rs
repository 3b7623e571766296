/*!
 * Limiter Lifecycle Tests
 * Start/stop, registration, removal, and handle release
 */

use super::common::{running_limiter, running_limiter_with, wait_for};
use duty_cycle_limiter::control::SimulatedController;
use duty_cycle_limiter::{Limiter, LimiterConfig, LimiterError, Phase};
use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};

#[test]
fn test_add_before_start_is_rejected() {
    let controller = SimulatedController::new();
    controller.spawn(100);
    let limiter = Limiter::with_controller(controller.clone(), LimiterConfig::default()).unwrap();

    assert_eq!(limiter.try_add_process(100, 50), Err(LimiterError::NotRunning));
    assert!(limiter.list_managed_ids(16).is_empty());
    assert_eq!(controller.open_handles(100), 0);
}

#[test]
fn test_duplicate_add_keeps_single_entry() {
    let (controller, limiter) = running_limiter(&[101]);

    assert!(limiter.add_process(101, 50));
    assert!(!limiter.add_process(101, 80));
    assert_eq!(limiter.try_add_process(101, 80), Err(LimiterError::AlreadyManaged(101)));

    assert_eq!(limiter.list_managed_ids(16), vec![101]);
    assert_eq!(limiter.process_stats(101).unwrap().percentage, 50);
    assert_eq!(controller.open_handles(101), 1);
}

#[test]
fn test_acquisition_failure_adds_nothing() {
    let (controller, limiter) = running_limiter(&[102]);
    controller.deny_open(102);

    assert!(!limiter.add_process(102, 50));
    assert!(!limiter.add_process(9999, 50));
    assert!(matches!(
        limiter.try_add_process(102, 50),
        Err(LimiterError::AcquisitionFailed { pid: 102, .. })
    ));
    assert_eq!(limiter.managed_count(), 0);
}

#[test]
fn test_remove_while_suspended_resumes() {
    let (controller, limiter) = running_limiter(&[103]);
    assert!(limiter.add_process(103, 90));

    assert!(wait_for(Duration::from_secs(1), || controller.is_suspended(103)));
    assert!(limiter.remove_process(103));

    assert!(!controller.is_suspended(103));
    assert_eq!(controller.open_handles(103), 0);
    assert!(!limiter.is_managed(103));
    assert!(!limiter.list_managed_ids(16).contains(&103));
    assert!(!limiter.remove_process(103));
}

#[test]
fn test_stop_resumes_everything() {
    let pids = [110, 111, 112];
    let (controller, limiter) = running_limiter(&pids);
    for &pid in &pids {
        assert!(limiter.add_process(pid, 95));
    }

    assert!(wait_for(Duration::from_secs(1), || {
        pids.iter().all(|&pid| controller.is_suspended(pid))
    }));

    limiter.stop();
    assert!(!limiter.is_running());
    assert_eq!(limiter.managed_count(), 0);
    for &pid in &pids {
        let state = controller.state(pid).unwrap();
        assert!(!state.suspended, "pid {} left suspended", pid);
        assert_eq!(state.open_handles, 0);
        assert_eq!(state.released_handles, 1);
    }

    // Stopped limiters reject new work.
    assert!(!limiter.add_process(110, 50));
}

#[test]
fn test_stop_is_prompt_with_long_cycle() {
    let (controller, limiter) = running_limiter_with(&[120], Duration::from_secs(10));
    assert!(limiter.add_process(120, 50));
    assert!(wait_for(Duration::from_secs(1), || controller.is_suspended(120)));

    let started = Instant::now();
    limiter.stop();
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(250), "stop took {:?}", elapsed);
    assert!(!controller.is_suspended(120));
}

#[test]
fn test_list_truncates_to_capacity() {
    let pids: Vec<u32> = (130..140).collect();
    let (_, limiter) = running_limiter(&pids);
    for &pid in &pids {
        assert!(limiter.add_process(pid, 10));
    }

    let mut all = limiter.list_managed_ids(64);
    all.sort_unstable();
    assert_eq!(all, pids);

    let some = limiter.list_managed_ids(3);
    assert_eq!(some.len(), 3);
    assert!(some.iter().all(|pid| pids.contains(pid)));
    assert!(limiter.list_managed_ids(0).is_empty());
}

#[test]
fn test_restart_after_stop() {
    let (controller, limiter) = running_limiter(&[140]);
    assert!(limiter.add_process(140, 50));
    limiter.stop();

    assert!(limiter.start());
    assert!(limiter.add_process(140, 50));
    assert!(wait_for(Duration::from_secs(1), || {
        limiter.process_stats(140).is_some_and(|s| s.phase == Phase::Suspended)
    }));
    assert_eq!(controller.state(140).unwrap().released_handles, 1);
}
