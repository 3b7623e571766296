/*!
 * Shared helpers for limiter tests
 */

use duty_cycle_limiter::control::SimulatedController;
use duty_cycle_limiter::{Limiter, LimiterBuilder, Pid};
use std::thread;
use std::time::{Duration, Instant};

/// Started limiter over a simulated process table with `pids` alive
pub fn running_limiter(pids: &[Pid]) -> (SimulatedController, Limiter<SimulatedController>) {
    running_limiter_with(pids, Duration::from_millis(200))
}

pub fn running_limiter_with(
    pids: &[Pid],
    cycle_length: Duration,
) -> (SimulatedController, Limiter<SimulatedController>) {
    let controller = SimulatedController::new();
    for &pid in pids {
        controller.spawn(pid);
    }

    let limiter = LimiterBuilder::new()
        .with_controller(controller.clone())
        .with_cycle_length(cycle_length)
        .build()
        .unwrap();
    assert!(limiter.start());
    (controller, limiter)
}

/// Poll `condition` until it holds or `timeout` runs out
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}
