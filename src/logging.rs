//! Tracing initialization.
//!
//! Structured logging for the pipeline via `tracing` and
//! `tracing-subscriber`. The filter comes from `RUST_LOG` when set,
//! otherwise from the configured log level.

use crate::config::Settings;
use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber from settings.
///
/// Returns an error if a global subscriber is already installed.
pub fn init(settings: &Settings) -> Result<()> {
    init_with_level(&settings.log_level)
}

pub fn init_with_level(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .try_init()
        .map_err(|e| anyhow!("failed to initialize tracing: {e}"))
}
