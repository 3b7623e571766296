/*!
 * Throttling Tests
 * Duty-cycle accuracy and failure handling under a running scheduler
 */

use super::common::{running_limiter, wait_for};
use duty_cycle_limiter::{LimiterError, LimiterEvent};
use pretty_assertions::assert_eq;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_half_duty_cycle_ratio() {
    let (controller, limiter) = running_limiter(&[200]);
    let started = Instant::now();
    assert!(limiter.add_process(200, 50));

    thread::sleep(Duration::from_millis(1000));
    let suspended = controller.state(200).unwrap().suspended_time();
    let elapsed = started.elapsed();

    let ratio = suspended.as_secs_f64() / elapsed.as_secs_f64();
    assert!((0.35..=0.65).contains(&ratio), "suspended ratio {:.2}", ratio);

    let stats = limiter.process_stats(200).unwrap();
    assert!(stats.suspend_count >= 4, "only {} suspensions", stats.suspend_count);
    assert_eq!(stats.suspend_duration, Duration::from_millis(100));
}

#[test]
fn test_independent_cycles() {
    let (controller, limiter) = running_limiter(&[210, 211]);
    assert!(limiter.add_process(210, 20));
    assert!(limiter.add_process(211, 80));

    thread::sleep(Duration::from_millis(1000));
    let light = controller.state(210).unwrap().suspended_time();
    let heavy = controller.state(211).unwrap().suspended_time();

    assert!(heavy > light * 2, "light {:?} heavy {:?}", light, heavy);
}

#[test]
fn test_exited_process_is_forgotten() {
    let (controller, limiter) = running_limiter(&[220]);
    assert!(limiter.add_process(220, 50));
    assert!(wait_for(Duration::from_secs(1), || controller.is_suspended(220)));

    controller.exit(220);
    let max_wakeup = limiter.config().max_wakeup_interval;
    assert!(wait_for(max_wakeup + Duration::from_millis(200), || {
        !limiter.is_managed(220)
    }));

    let state = controller.state(220).unwrap();
    assert_eq!(state.calls_after_exit, 0);
    assert_eq!(state.open_handles, 0);
}

#[test]
fn test_unsuspendable_process_tried_once() {
    let (controller, limiter) = running_limiter(&[230, 231]);
    controller.make_unsuspendable(230);
    assert!(limiter.add_process(230, 50));
    assert!(limiter.add_process(231, 50));

    assert!(wait_for(Duration::from_secs(1), || !limiter.is_managed(230)));
    thread::sleep(Duration::from_millis(300));

    let state = controller.state(230).unwrap();
    assert_eq!(state.suspend_calls, 1);
    assert_eq!(state.open_handles, 0);
    assert!(limiter.is_managed(231));
}

#[test]
fn test_failed_resume_is_retried() {
    let (controller, limiter) = running_limiter(&[240]);
    assert!(limiter.add_process(240, 50));
    assert!(wait_for(Duration::from_secs(1), || controller.is_suspended(240)));
    controller.fail_resumes(240, 3);

    assert!(wait_for(Duration::from_secs(1), || {
        controller.state(240).is_some_and(|s| s.resume_calls >= 4)
    }));

    let stats = limiter.process_stats(240).unwrap();
    assert_eq!(stats.resume_failures, 3);
    assert!(stats.resume_count >= 1);
    assert!(limiter.is_managed(240));
}

#[test]
fn test_persistent_resume_failure_is_paced() {
    let (controller, limiter) = running_limiter(&[245]);
    let events = limiter.subscribe();
    assert!(limiter.add_process(245, 50));
    assert!(wait_for(Duration::from_secs(1), || controller.is_suspended(245)));
    controller.fail_resumes(245, u32::MAX);

    let before = controller.state(245).unwrap().resume_calls;
    thread::sleep(Duration::from_millis(500));
    let attempts = controller.state(245).unwrap().resume_calls - before;

    // One attempt per retry interval at most, plus slack for the first one.
    let retry = limiter.config().resume_retry_interval;
    let ceiling = (500 / retry.as_millis() as u32) + 3;
    assert!(attempts >= 2, "only {} resume attempts", attempts);
    assert!(attempts <= ceiling, "{} resume attempts in 500ms", attempts);

    let reported = events
        .try_iter()
        .filter(|e| matches!(e, LimiterEvent::ResumeFailed { pid: 245, .. }))
        .count();
    assert_eq!(reported, 1);
    assert!(limiter.is_managed(245));
}

#[test]
fn test_set_limit_applies_to_running_entry() {
    let (controller, limiter) = running_limiter(&[250]);
    assert!(limiter.add_process(250, 10));

    assert!(limiter.set_limit(250, 90));
    let stats = limiter.process_stats(250).unwrap();
    assert_eq!(stats.percentage, 90);
    assert_eq!(stats.suspend_duration, Duration::from_millis(180));
    assert_eq!(stats.resume_duration, Duration::from_millis(20));

    assert!(!limiter.set_limit(251, 90));
    assert_eq!(limiter.try_set_limit(251, 90), Err(LimiterError::NotManaged(251)));
    limiter.stop();
    assert!(!controller.is_suspended(250));
}
