//! Keyed-record tables for table-backed config stores
//!
//! A table holds one row per [`RecordKey`] with an opaque, already encrypted
//! payload column. [`SqlConfigTable`] stores rows in SQLite through sqlx;
//! [`MemoryConfigTable`] keeps them in process for tests and tooling.

use super::pool::DbPool;
use super::record::RecordKey;
use crate::errors::{BudError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;
use tracing::{debug, error, Instrument};

/// Maximum accepted table identifier length
const MAX_TABLE_NAME_LEN: usize = 64;

/// Reader and writer for encrypted config rows
#[async_trait]
pub trait ConfigTable: Send + Sync + fmt::Debug {
    /// Fetch the payload stored for a key
    async fn fetch(&self, table: &str, key: &RecordKey) -> Result<Option<String>>;

    /// Insert or replace the payload stored for a key
    async fn upsert(&self, table: &str, key: &RecordKey, payload: &str) -> Result<()>;

    /// Delete the row for a key, returning whether one existed
    async fn delete(&self, table: &str, key: &RecordKey) -> Result<bool>;
}

/// Check a table name is a plain SQL identifier
///
/// Table names come from settings and are interpolated into SQL, so only
/// ASCII letters, digits and underscores are accepted.
pub fn validate_table_name(table: &str) -> std::result::Result<(), String> {
    if table.is_empty() || table.len() > MAX_TABLE_NAME_LEN {
        return Err(format!("table name must be 1-{} characters", MAX_TABLE_NAME_LEN));
    }

    let mut chars = table.chars();
    let starts_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !starts_ok || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!("'{}' is not a valid table identifier", table));
    }

    Ok(())
}

fn checked_table(table: &str) -> Result<&str> {
    validate_table_name(table).map_err(|reason| BudError::validation_field(reason, "table"))?;
    Ok(table)
}

/// SQLite-backed config table
#[derive(Debug, Clone)]
pub struct SqlConfigTable {
    pool: DbPool,
}

impl SqlConfigTable {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Create the table and its unique key if they don't exist
    pub async fn ensure_table(&self, table: &str) -> Result<()> {
        let table = checked_table(table)?;

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                service TEXT NOT NULL,
                name TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                tenancy TEXT NOT NULL,
                config TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (service, name, tenant_id, tenancy)
            )"
        );

        sqlx::query(&ddl).execute(&self.pool).await.map_err(|e| {
            error!(table = %table, error = %e, "Failed to create config table");
            BudError::database(e, format!("Failed to create config table '{}'", table))
        })?;

        debug!(table = %table, "Config table ready");
        Ok(())
    }
}

#[async_trait]
impl ConfigTable for SqlConfigTable {
    async fn fetch(&self, table: &str, key: &RecordKey) -> Result<Option<String>> {
        let table = checked_table(table)?;
        let sql = format!(
            "SELECT config FROM {table} \
             WHERE service = ? AND name = ? AND tenant_id = ? AND tenancy = ? LIMIT 1"
        );

        sqlx::query_scalar::<_, String>(&sql)
            .bind(&key.service)
            .bind(&key.name)
            .bind(&key.tenant_id)
            .bind(&key.tenancy)
            .fetch_optional(&self.pool)
            .instrument(crate::store_span!("fetch", table = %table, key = %key))
            .await
            .map_err(|e| {
                error!(table = %table, key = %key, error = %e, "Config query failed");
                BudError::database(e, "Failed to fetch config record")
            })
    }

    async fn upsert(&self, table: &str, key: &RecordKey, payload: &str) -> Result<()> {
        let table = checked_table(table)?;
        let sql = format!(
            "INSERT INTO {table} (service, name, tenant_id, tenancy, config, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (service, name, tenant_id, tenancy) \
             DO UPDATE SET config = excluded.config, updated_at = excluded.updated_at"
        );
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(&sql)
            .bind(&key.service)
            .bind(&key.name)
            .bind(&key.tenant_id)
            .bind(&key.tenancy)
            .bind(payload)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .instrument(crate::store_span!("upsert", table = %table, key = %key))
            .await
            .map_err(|e| {
                error!(table = %table, key = %key, error = %e, "Config upsert failed");
                BudError::database(e, "Failed to store config record")
            })?;

        Ok(())
    }

    async fn delete(&self, table: &str, key: &RecordKey) -> Result<bool> {
        let table = checked_table(table)?;
        let sql = format!(
            "DELETE FROM {table} WHERE service = ? AND name = ? AND tenant_id = ? AND tenancy = ?"
        );

        let result = sqlx::query(&sql)
            .bind(&key.service)
            .bind(&key.name)
            .bind(&key.tenant_id)
            .bind(&key.tenancy)
            .execute(&self.pool)
            .instrument(crate::store_span!("delete", table = %table, key = %key))
            .await
            .map_err(|e| BudError::database(e, "Failed to delete config record"))?;

        Ok(result.rows_affected() > 0)
    }
}

/// In-process config table
#[derive(Debug, Default)]
pub struct MemoryConfigTable {
    rows: RwLock<HashMap<(String, RecordKey), String>>,
}

impl MemoryConfigTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows across all tables
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ConfigTable for MemoryConfigTable {
    async fn fetch(&self, table: &str, key: &RecordKey) -> Result<Option<String>> {
        let rows = self.rows.read().await;
        Ok(rows.get(&(table.to_string(), key.clone())).cloned())
    }

    async fn upsert(&self, table: &str, key: &RecordKey, payload: &str) -> Result<()> {
        let mut rows = self.rows.write().await;
        rows.insert((table.to_string(), key.clone()), payload.to_string());
        Ok(())
    }

    async fn delete(&self, table: &str, key: &RecordKey) -> Result<bool> {
        let mut rows = self.rows.write().await;
        Ok(rows.remove(&(table.to_string(), key.clone())).is_some())
    }
}
