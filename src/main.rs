/*!
 * Duty-Cycle Limiter - Command Line Entry Point
 *
 * Usage: limiter <pid>:<percent> [<pid>:<percent> ...]
 *
 * Throttles each PID by suspending it for <percent> of every cycle until
 * interrupted, then resumes everything before exiting.
 */

use duty_cycle_limiter::{init_tracing, Limiter, LimiterBuilder, LimiterEvent, Pid};
use miette::{miette, IntoDiagnostic, Result, WrapErr};
use std::time::Duration;
use tracing::{error, info, warn};

const STATUS_INTERVAL: Duration = Duration::from_secs(5);

fn parse_target(arg: &str) -> Result<(Pid, u32)> {
    let (pid, percentage) = arg
        .split_once(':')
        .ok_or_else(|| miette!("expected <pid>:<percent>, got '{}'", arg))?;

    let pid = pid
        .trim()
        .parse::<Pid>()
        .into_diagnostic()
        .wrap_err_with(|| format!("invalid pid in '{}'", arg))?;
    let percentage = percentage
        .trim()
        .trim_end_matches('%')
        .parse::<u32>()
        .into_diagnostic()
        .wrap_err_with(|| format!("invalid percentage in '{}'", arg))?;

    Ok((pid, percentage))
}

fn log_status(limiter: &Limiter) {
    let stats = limiter.all_stats();
    info!(managed = stats.len(), "Limiter status");
    for entry in &stats {
        match serde_json::to_string(entry) {
            Ok(json) => info!(pid = entry.pid, stats = %json, "Process status"),
            Err(e) => warn!(pid = entry.pid, error = %e, "Could not serialize stats"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let targets = std::env::args()
        .skip(1)
        .map(|arg| parse_target(&arg))
        .collect::<Result<Vec<_>>>()?;
    if targets.is_empty() {
        return Err(miette!("usage: limiter <pid>:<percent> [<pid>:<percent> ...]"));
    }

    let limiter = LimiterBuilder::from_env()?.build()?;
    info!(platform = %limiter.platform(), "Duty-cycle limiter starting");

    if !limiter.start() {
        return Err(miette!(
            "process control is not available on this platform ({})",
            limiter.platform()
        ));
    }

    let events = limiter.subscribe();
    for (pid, percentage) in targets {
        if let Err(e) = limiter.try_add_process(pid, percentage) {
            error!(pid, error = %e, "Could not throttle process");
        }
    }
    if limiter.managed_count() == 0 {
        limiter.stop();
        return Err(miette!("none of the requested processes could be throttled"));
    }

    let mut status = tokio::time::interval(STATUS_INTERVAL);
    status.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, shutting down");
                break;
            }
            _ = status.tick() => log_status(&limiter),
            Ok(event) = events.recv_async() => {
                match event {
                    LimiterEvent::Exited { pid } => info!(pid, "Target exited"),
                    LimiterEvent::Unsupported { pid, reason } => {
                        warn!(pid, error = %reason, "Target cannot be suspended")
                    }
                    _ => continue,
                }
                if limiter.managed_count() == 0 {
                    info!("No targets left, shutting down");
                    break;
                }
            }
        }
    }

    limiter.stop();
    info!("Duty-cycle limiter stopped");
    Ok(())
}
