//! Config store manager
//!
//! Registry of named store drivers plus a cache of the stores they have
//! constructed. A store is built the first time its name is requested and
//! reused until [`ConfigStoreManager::flush_resolved`] is called.

use super::store::ConfigStore;
use super::{database, filesystem, DatabaseConfigStore, FilesystemConfigStore};
use crate::config::{Settings, StoreSettings, StoresSettings};
use crate::errors::{Misconfiguration, Result};
use crate::services::{AesGcmEncrypter, Encrypter};
use crate::storage::{create_pool, ConfigTable, Disk, LocalDisk, SqlConfigTable};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info};

/// Factory name used in misconfiguration errors
pub const FACTORY_NAME: &str = "config";

/// Constructs a store from its name, settings and the shared environment
pub type StoreCreator = Arc<
    dyn Fn(&str, &StoreSettings, &StoreEnvironment) -> Result<Arc<dyn ConfigStore>> + Send + Sync,
>;

/// Capabilities shared by every store the manager constructs
#[derive(Clone)]
pub struct StoreEnvironment {
    encrypter: Arc<dyn Encrypter>,
    connections: HashMap<String, Arc<dyn ConfigTable>>,
    disks: HashMap<String, Arc<dyn Disk>>,
}

impl fmt::Debug for StoreEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreEnvironment")
            .field("encrypter", &self.encrypter)
            .field("connections", &self.connections.keys().collect::<Vec<_>>())
            .field("disks", &self.disks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StoreEnvironment {
    /// Create an environment with no connections or disks
    pub fn new(encrypter: Arc<dyn Encrypter>) -> Self {
        Self { encrypter, connections: HashMap::new(), disks: HashMap::new() }
    }

    /// Build the environment described by the settings
    ///
    /// Opens a pool per configured connection and a local disk per configured
    /// disk. Tables are not created here, see [`SqlConfigTable::ensure_table`].
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let encrypter = AesGcmEncrypter::from_settings(&settings.encryption)?;
        let mut env = Self::new(Arc::new(encrypter));

        for (name, connection) in &settings.connections {
            let pool = create_pool(connection).await?;
            env = env.with_connection(name.clone(), Arc::new(SqlConfigTable::new(pool)));
        }

        for (name, disk) in &settings.disks {
            env = env.with_disk(name.clone(), Arc::new(LocalDisk::new(disk.root.clone())));
        }

        Ok(env)
    }

    pub fn with_connection(mut self, name: impl Into<String>, table: Arc<dyn ConfigTable>) -> Self {
        self.connections.insert(name.into(), table);
        self
    }

    pub fn with_disk(mut self, name: impl Into<String>, disk: Arc<dyn Disk>) -> Self {
        self.disks.insert(name.into(), disk);
        self
    }

    pub fn encrypter(&self) -> Arc<dyn Encrypter> {
        self.encrypter.clone()
    }

    pub fn connection(&self, name: &str) -> Option<Arc<dyn ConfigTable>> {
        self.connections.get(name).cloned()
    }

    pub fn disk(&self, name: &str) -> Option<Arc<dyn Disk>> {
        self.disks.get(name).cloned()
    }
}

/// Registry and lazy cache of config stores
pub struct ConfigStoreManager {
    settings: StoresSettings,
    env: StoreEnvironment,
    creators: RwLock<HashMap<String, StoreCreator>>,
    resolved: Mutex<HashMap<String, Arc<dyn ConfigStore>>>,
}

impl fmt::Debug for ConfigStoreManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let drivers: Vec<String> = self
            .creators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        let resolved: Vec<String> = self.resolved().keys().cloned().collect();

        f.debug_struct("ConfigStoreManager")
            .field("default", &self.settings.default)
            .field("drivers", &drivers)
            .field("resolved", &resolved)
            .finish()
    }
}

impl ConfigStoreManager {
    /// Create a manager with the built-in `database` and `filesystem` drivers
    pub fn new(settings: StoresSettings, env: StoreEnvironment) -> Self {
        let manager = Self {
            settings,
            env,
            creators: RwLock::new(HashMap::new()),
            resolved: Mutex::new(HashMap::new()),
        };

        manager.register(database::DRIVER, Arc::new(create_database_store));
        manager.register(filesystem::DRIVER, Arc::new(create_filesystem_store));

        manager
    }

    /// Name used to identify this manager in errors
    pub fn factory_name(&self) -> &'static str {
        FACTORY_NAME
    }

    /// The configured default store name
    pub fn default_name(&self) -> Option<&str> {
        self.settings.default.as_deref().filter(|name| !name.is_empty())
    }

    /// Settings key a store's configuration lives under
    pub fn config_key(&self, name: &str) -> String {
        format!("bud.stores.{}", name)
    }

    pub fn settings(&self) -> &StoresSettings {
        &self.settings
    }

    pub fn environment(&self) -> &StoreEnvironment {
        &self.env
    }

    /// Register a driver, replacing any existing creator of the same name
    pub fn register(&self, driver: impl Into<String>, creator: StoreCreator) {
        let driver = driver.into();
        info!(driver = %driver, "Registering config store driver");
        self.creators.write().unwrap_or_else(PoisonError::into_inner).insert(driver, creator);
    }

    pub fn has_driver(&self, driver: &str) -> bool {
        self.creators.read().unwrap_or_else(PoisonError::into_inner).contains_key(driver)
    }

    // Entries are inserted only after a creator returns, so a panicking
    // creator leaves the cache as it was
    fn resolved(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn ConfigStore>>> {
        self.resolved.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a store has been resolved, or any store when `name` is `None`
    pub fn has_resolved(&self, name: Option<&str>) -> bool {
        let resolved = self.resolved();
        match name {
            Some(name) => resolved.contains_key(name),
            None => !resolved.is_empty(),
        }
    }

    /// Drop every resolved store so the next request constructs afresh
    pub fn flush_resolved(&self) {
        let mut resolved = self.resolved();
        debug!(count = resolved.len(), "Flushing resolved config stores");
        resolved.clear();
    }

    /// Get a store by name, or the default store when `name` is `None`
    pub fn get(&self, name: Option<&str>) -> Result<Arc<dyn ConfigStore>> {
        let name = match name {
            Some(name) => name,
            None => self
                .default_name()
                .ok_or(Misconfiguration::NoDefault { factory: FACTORY_NAME.to_string() })?,
        };

        let mut resolved = self.resolved();

        if let Some(store) = resolved.get(name) {
            debug!(store = %name, "Using resolved config store");
            return Ok(store.clone());
        }

        let store = self.resolve(name)?;
        resolved.insert(name.to_string(), store.clone());
        Ok(store)
    }

    fn resolve(&self, name: &str) -> Result<Arc<dyn ConfigStore>> {
        let settings = self.settings.store(name).ok_or_else(|| Misconfiguration::ConfigNotFound {
            factory: FACTORY_NAME.to_string(),
            name: name.to_string(),
        })?;

        let driver = settings.driver.as_deref().filter(|d| !d.is_empty()).unwrap_or(name);

        let creator = self
            .creators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(driver)
            .cloned()
            .ok_or_else(|| Misconfiguration::CreatorNotFound {
                factory: FACTORY_NAME.to_string(),
                name: driver.to_string(),
            })?;

        let store = creator(name, settings, &self.env)?;
        info!(store = %name, driver = %driver, "Config store constructed");
        Ok(store)
    }
}

fn create_database_store(
    name: &str,
    settings: &StoreSettings,
    env: &StoreEnvironment,
) -> Result<Arc<dyn ConfigStore>> {
    Ok(Arc::new(DatabaseConfigStore::from_settings(name, settings, env)?))
}

fn create_filesystem_store(
    name: &str,
    settings: &StoreSettings,
    env: &StoreEnvironment,
) -> Result<Arc<dyn ConfigStore>> {
    Ok(Arc::new(FilesystemConfigStore::from_settings(name, settings, env)?))
}
