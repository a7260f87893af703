//! Table-backed config store
//!
//! Records live in a configured table of a named database connection, one
//! row per (service, name, tenant, tenancy).

use super::codec::{ConfigCodec, ConfigMap};
use super::manager::StoreEnvironment;
use super::store::ConfigStore;
use crate::config::StoreSettings;
use crate::errors::{Misconfiguration, Result};
use crate::services::Encrypter;
use crate::storage::{validate_table_name, ConfigTable, RecordKey};
use crate::tenancy::{Tenancy, Tenant};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Driver name of the table-backed store
pub const DRIVER: &str = "database";

/// Connection used when a store doesn't name one
pub const DEFAULT_CONNECTION: &str = "default";

/// Config store reading encrypted rows from a table
#[derive(Debug)]
pub struct DatabaseConfigStore {
    name: String,
    table: String,
    connection: String,
    source: Arc<dyn ConfigTable>,
    codec: ConfigCodec,
}

impl DatabaseConfigStore {
    /// Create a store over a table, rejecting unusable table names
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        source: Arc<dyn ConfigTable>,
        encrypter: Arc<dyn Encrypter>,
    ) -> Result<Self> {
        let name = name.into();
        let table = table.into();

        validate_table_name(&table)
            .map_err(|reason| Misconfiguration::invalid_value(&name, "table", reason))?;

        Ok(Self {
            name,
            table,
            connection: DEFAULT_CONNECTION.to_string(),
            source,
            codec: ConfigCodec::new(encrypter),
        })
    }

    /// Create a store from its settings
    ///
    /// Requires the `table` option; `connection` defaults to
    /// [`DEFAULT_CONNECTION`] and must be registered in the environment.
    pub fn from_settings(
        name: &str,
        settings: &StoreSettings,
        env: &StoreEnvironment,
    ) -> Result<Self> {
        let table = settings
            .option_str("table")
            .ok_or_else(|| Misconfiguration::missing_value(name, "table"))?;

        let connection = settings.option_str("connection").unwrap_or(DEFAULT_CONNECTION);
        let source = env.connection(connection).ok_or_else(|| {
            Misconfiguration::invalid_value(
                name,
                "connection",
                format!("no connection named [{}] is registered", connection),
            )
        })?;

        let mut store = Self::new(name, table, source, env.encrypter())?;
        store.connection = connection.to_string();
        Ok(store)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn connection(&self) -> &str {
        &self.connection
    }
}

#[async_trait]
impl ConfigStore for DatabaseConfigStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn driver(&self) -> &str {
        DRIVER
    }

    async fn get(
        &self,
        tenancy: &dyn Tenancy,
        tenant: &dyn Tenant,
        service: &str,
        name: &str,
    ) -> Result<Option<ConfigMap>> {
        let key = RecordKey::for_tenant(tenancy, tenant, service, name);

        let Some(payload) = self.source.fetch(&self.table, &key).await? else {
            debug!(store = %self.name, key = %key, "No config record found");
            return Ok(None);
        };

        Ok(super::decode_record(&self.codec, &self.name, &key, &payload))
    }

    async fn set(
        &self,
        tenancy: &dyn Tenancy,
        tenant: &dyn Tenant,
        service: &str,
        name: &str,
        config: &ConfigMap,
    ) -> Result<()> {
        let key = RecordKey::for_tenant(tenancy, tenant, service, name);
        let payload = self.codec.encode(config)?;

        self.source.upsert(&self.table, &key, &payload).await?;
        debug!(store = %self.name, key = %key, "Config record stored");
        Ok(())
    }

    async fn forget(
        &self,
        tenancy: &dyn Tenancy,
        tenant: &dyn Tenant,
        service: &str,
        name: &str,
    ) -> Result<bool> {
        let key = RecordKey::for_tenant(tenancy, tenant, service, name);
        self.source.delete(&self.table, &key).await
    }
}
