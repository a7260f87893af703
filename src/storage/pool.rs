//! SQLite pools backing table-based config stores
//!
//! One pool is opened per configured connection. File databases are created
//! on first use and run in WAL mode so CLI writes and host reads can overlap.

use crate::config::ConnectionSettings;
use crate::errors::{BudError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info};

pub type DbPool = Pool<Sqlite>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a pool for a configured connection
pub async fn create_pool(settings: &ConnectionSettings) -> Result<DbPool> {
    check_pool_bounds(settings)?;

    let in_memory = is_in_memory(&settings.url);
    let options = connect_options(&settings.url, in_memory)?;

    let pool = pool_options(settings, in_memory).connect_with(options).await.map_err(|e| {
        error!(error = %e, url = %settings.url, "Could not open config database");
        BudError::database(e, format!("Failed to open config database {}", settings.url))
    })?;

    info!(
        url = %settings.url,
        in_memory,
        max_connections = settings.max_connections,
        "Opened config database"
    );

    Ok(pool)
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

fn connect_options(url: &str, in_memory: bool) -> Result<SqliteConnectOptions> {
    if !url.starts_with("sqlite:") {
        return Err(BudError::validation(format!(
            "Config database URL '{}' must use the sqlite: scheme",
            url
        )));
    }

    let options = SqliteConnectOptions::from_str(url)
        .map_err(|e| BudError::database(e, format!("Invalid SQLite URL: {}", url)))?
        .busy_timeout(BUSY_TIMEOUT);

    // WAL needs a file; memory databases keep the default journal
    Ok(if in_memory {
        options
    } else {
        options.create_if_missing(true).journal_mode(SqliteJournalMode::Wal)
    })
}

fn pool_options(settings: &ConnectionSettings, in_memory: bool) -> SqlitePoolOptions {
    // Each connection to :memory: is its own database
    let max = if in_memory { 1 } else { settings.max_connections };

    let options = SqlitePoolOptions::new()
        .max_connections(max)
        .min_connections(settings.min_connections.min(max))
        .acquire_timeout(settings.connect_timeout());

    match settings.idle_timeout() {
        Some(idle) if !in_memory => options.idle_timeout(idle),
        // A memory database vanishes with its last connection
        _ => options.idle_timeout(None).max_lifetime(None),
    }
}

fn check_pool_bounds(settings: &ConnectionSettings) -> Result<()> {
    if settings.max_connections == 0 {
        return Err(BudError::validation("max_connections must be at least 1"));
    }
    if settings.min_connections > settings.max_connections {
        return Err(BudError::validation(format!(
            "min_connections ({}) exceeds max_connections ({})",
            settings.min_connections, settings.max_connections
        )));
    }
    Ok(())
}
