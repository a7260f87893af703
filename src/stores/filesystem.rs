//! Filesystem-backed config store
//!
//! Each record is a blob on a named disk, at
//! `[directory/]<tenancy>/<tenant>/<service>/<name>`, each segment
//! percent-encoded.

use super::codec::{ConfigCodec, ConfigMap};
use super::manager::StoreEnvironment;
use super::store::ConfigStore;
use crate::config::StoreSettings;
use crate::errors::{Misconfiguration, Result};
use crate::services::Encrypter;
use crate::storage::{encode_segment, validate_blob_path, Disk, RecordKey};
use crate::tenancy::{Tenancy, Tenant};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Driver name of the filesystem-backed store
pub const DRIVER: &str = "filesystem";

/// Config store reading encrypted blobs from a disk
#[derive(Debug)]
pub struct FilesystemConfigStore {
    name: String,
    disk_name: String,
    directory: Option<String>,
    disk: Arc<dyn Disk>,
    codec: ConfigCodec,
}

impl FilesystemConfigStore {
    pub fn new(
        name: impl Into<String>,
        disk_name: impl Into<String>,
        disk: Arc<dyn Disk>,
        encrypter: Arc<dyn Encrypter>,
    ) -> Self {
        Self {
            name: name.into(),
            disk_name: disk_name.into(),
            directory: None,
            disk,
            codec: ConfigCodec::new(encrypter),
        }
    }

    /// Prefix every blob path with a directory
    pub fn with_directory(mut self, directory: &str) -> Result<Self> {
        let directory = directory.trim_matches('/');
        validate_blob_path(directory).map_err(|e| {
            Misconfiguration::invalid_value(&self.name, "directory", e.to_string())
        })?;
        self.directory = Some(directory.to_string());
        Ok(self)
    }

    /// Create a store from its settings
    ///
    /// Requires the `disk` option naming a disk registered in the
    /// environment; `directory` is optional.
    pub fn from_settings(
        name: &str,
        settings: &StoreSettings,
        env: &StoreEnvironment,
    ) -> Result<Self> {
        let disk_name = settings
            .option_str("disk")
            .ok_or_else(|| Misconfiguration::missing_value(name, "disk"))?;

        let disk = env.disk(disk_name).ok_or_else(|| {
            Misconfiguration::invalid_value(
                name,
                "disk",
                format!("no disk named [{}] is registered", disk_name),
            )
        })?;

        let store = Self::new(name, disk_name, disk, env.encrypter());
        match settings.option_str("directory") {
            Some(directory) => store.with_directory(directory),
            None => Ok(store),
        }
    }

    pub fn disk_name(&self) -> &str {
        &self.disk_name
    }

    /// Blob path for a record key
    ///
    /// Segments are percent-encoded, so any tenant identifier or record name
    /// maps to a single path component.
    pub fn blob_path(&self, key: &RecordKey) -> Result<String> {
        let segments = [&key.tenancy, &key.tenant_id, &key.service, &key.name]
            .map(|segment| encode_segment(segment));

        let relative = segments.join("/");
        let path = match &self.directory {
            Some(directory) => format!("{}/{}", directory, relative),
            None => relative,
        };

        validate_blob_path(&path)?;
        Ok(path)
    }
}

#[async_trait]
impl ConfigStore for FilesystemConfigStore {
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
        let path = self.blob_path(&key)?;

        let Some(payload) = self.disk.get(&path).await? else {
            debug!(store = %self.name, key = %key, "No config blob found");
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
        let path = self.blob_path(&key)?;
        let payload = self.codec.encode(config)?;

        self.disk.put(&path, &payload).await?;
        debug!(store = %self.name, key = %key, "Config blob stored");
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
        let path = self.blob_path(&key)?;
        self.disk.delete(&path).await
    }
}
