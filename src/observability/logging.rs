//! # Structured Logging
//!
//! Logging setup and span helpers built on the tracing ecosystem.
//!
//! Config payloads are never recorded; spans carry the store name and the
//! record key only.

use crate::config::LoggingSettings;
use crate::errors::{BudError, Result};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Create a tracing span for backing-medium operations.
///
/// ```rust,ignore
/// let span = store_span!("fetch", store = "database", key = %key);
/// ```
#[macro_export]
macro_rules! store_span {
    ($operation:expr) => {
        tracing::debug_span!(
            "store_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "store_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Calling this twice
/// returns a configuration error instead of panicking.
pub fn init_logging(settings: &LoggingSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .map_err(|e| {
            BudError::config(format!("Invalid log level '{}': {}", settings.level, e))
        })?;

    let builder = FmtSubscriber::builder().with_env_filter(filter).with_target(true);

    let installed = if settings.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };

    installed.map_err(|e| {
        BudError::config_with_source("Failed to install tracing subscriber", Box::new(e))
    })?;

    tracing::debug!(level = %settings.level, json = settings.json, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros_compile() {
        let _span = store_span!("fetch");
        let _span = store_span!("fetch", store = "database", table = "tenant_config");
    }

    #[test]
    fn test_invalid_level_rejected() {
        // Only meaningful when RUST_LOG is unset; otherwise the env filter wins.
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let settings = LoggingSettings { level: "bud=loudest".to_string(), json: false };
        assert!(matches!(init_logging(&settings), Err(BudError::Config { .. })));
    }
}
