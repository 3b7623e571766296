/*!
 * Structured Tracing
 * Subscriber setup for the limiter binary
 *
 * The library only emits events; installing a subscriber is left to the
 * embedding program. The `limiter` binary calls [`init_tracing`] first thing.
 */

use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const JSON_ENV: &str = "LIMITER_TRACE_JSON";
const DEFAULT_DIRECTIVE: &str = "info";

/// Install the global subscriber
///
/// Environment variables:
/// - RUST_LOG: filter directives (default: info)
/// - LIMITER_TRACE_JSON: `1` or `true` for one JSON object per line
///
/// Returns false if a subscriber was already installed.
pub fn init_tracing() -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let json = json_requested(std::env::var(JSON_ENV).ok().as_deref());

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_thread_names(true)
                    .with_current_span(true),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_thread_names(true)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        debug!(json, "Tracing initialized");
    }
    installed
}

fn json_requested(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("1") | Some("true"))
}
