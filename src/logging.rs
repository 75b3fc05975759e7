//! `tracing` subscriber setup for the desktop shell and the CLI.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_DIRECTIVE: &str = "info";

fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Install a fmt subscriber filtered by `RUST_LOG` (default `info`).
/// Returns an error if a global subscriber is already set.
pub fn try_init(default_directive: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(default_directive))
        .with(fmt::layer().with_target(false))
        .try_init()
}

/// Like [`try_init`], but a second call is a no-op.
pub fn init() {
    if try_init(DEFAULT_DIRECTIVE).is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
