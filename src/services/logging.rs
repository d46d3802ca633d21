//! Log subscriber setup.
//!
//! All output goes to stderr so stdout stays free for command results and the
//! RPC protocol. `RUST_LOG` overrides the configured level.

use std::sync::OnceLock;

use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::types::errors::LogError;
use crate::types::settings::{LogFormat, LoggingSettings};

static LOGGING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Builds the filter: `RUST_LOG` when set and valid, otherwise the configured level.
pub fn build_filter(level: &str) -> Result<EnvFilter, LogError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|e| LogError::InvalidFilter(e.to_string())),
    }
}

/// Installs the global subscriber. Call once per process.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), LogError> {
    if LOGGING_INITIALIZED.get().is_some() {
        return Err(LogError::AlreadyInitialized);
    }
    let filter = build_filter(&settings.level)?;

    let installed = match settings.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .compact(),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .flatten_event(true),
            )
            .try_init(),
    };
    installed.map_err(|e| LogError::InstallFailed(e.to_string()))?;

    let _ = LOGGING_INITIALIZED.set(());
    Ok(())
}
