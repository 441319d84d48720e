//! Structured logging initialization.

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured logging.
///
/// `RUST_LOG` takes precedence over `default_directive` (e.g. `"info"` or
/// `"info,vwap_feed=debug"`). Output is JSON when `RUST_ENV=production`,
/// pretty otherwise.
pub fn init_logging(default_directive: &str) -> TelemetryResult<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)
            .map_err(|e| TelemetryError::LoggingInit(format!("{default_directive}: {e}")))?,
    };

    if is_production() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_target(true))
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    Ok(())
}

fn is_production() -> bool {
    std::env::var("RUST_ENV")
        .map(|v| v == "production")
        .unwrap_or(false)
}
