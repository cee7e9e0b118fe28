//! Structured logging setup.
//!
//! All diagnostics go to stderr; stdout carries only response envelopes.
//! The filter is fixed at process start (env override via `RUST_LOG`), so no
//! call site can mutate log levels mid-run.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// `verbose` widens the default filter to debug for this crate and includes
/// targets in the output. Calling twice is a no-op (tests).
pub fn init_tracing(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("droidpilot=debug,info")
            } else {
                EnvFilter::try_new("droidpilot=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}
