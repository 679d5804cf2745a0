//! Structured logging setup for facility-pulse.
//!
//! Configures a `tracing` subscriber with span-close events, file/line info,
//! and an `EnvFilter` driven by `RUST_LOG` (falling back to `info`). Call
//! [`init`] once, near the top of a binary's `main`; library code never
//! installs a subscriber itself.

use tracing_subscriber::{EnvFilter, Layer, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes the global tracing subscriber with formatted output.
///
/// Safe to call more than once per process only in tests, where
/// [`tracing_subscriber::util::SubscriberInitExt::try_init`] is used instead
/// so repeated test-module initialization doesn't panic.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_span_events(FmtSpan::CLOSE)
                .with_file(true)
                .with_line_number(true)
                .with_level(true)
                .with_filter(filter),
        )
        .init();
}

/// Test-friendly variant of [`init`] that tolerates being called from
/// multiple test modules in the same process.
#[cfg(test)]
pub fn init_for_tests() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(filter))
        .try_init();
}
