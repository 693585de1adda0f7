//! Global `tracing` subscriber setup.

use crate::config::LoggingConfig;
use crate::errors::{ContextflowError, Result};
use tracing_subscriber::EnvFilter;

/// Builds the filter: `RUST_LOG` when set and valid, the configured level otherwise.
fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| ContextflowError::Config(format!("invalid log level '{}': {e}", config.level)))
}

/// Installs a global `fmt` subscriber.
///
/// # Errors
///
/// Returns `ContextflowError::Config` if the level does not parse or a
/// global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| ContextflowError::Config(format!("cannot install subscriber: {e}")))
}
