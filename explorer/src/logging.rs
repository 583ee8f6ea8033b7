//! Development-time tracing for the explorer.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: diagnostics via `RUST_LOG`, output to stderr.
//!   Not persisted, not part of the session artifacts.
//!
//! - **Round logging (`io/round_log`)**: product artifacts in the session
//!   directory (`explore.jsonl`, `reflect.jsonl`, `summary.json`). Always
//!   written, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `explorer=info` so round progress is visible.
///
/// # Example
/// ```bash
/// RUST_LOG=explorer=debug explorer explore --app Settings --task "turn on dark mode"
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("explorer=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
