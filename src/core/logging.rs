//! Tracing subscriber setup.
//!
//! The global dispatcher is the single diagnostic sink shared by every
//! tracker and session. `RUST_LOG` overrides the default verbosity, e.g.
//! `RUST_LOG=eunion_stream=debug` to see handshake traffic or `trace` to
//! see every forwarded frame.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// Safe to call more than once: later calls leave the first subscriber in
/// place and return `false`.
pub fn init_tracing(default_directive: &str) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
