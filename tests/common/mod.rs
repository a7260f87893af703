//! Common test utilities for all integration tests.
//!
//! Fakes for the tenancy contracts, a counting config store and recording
//! service builders, so tests can assert which collaborators were touched.

#![allow(dead_code)]
#![allow(clippy::duplicate_mod)]

use async_trait::async_trait;
use bud::config::{StoreSettings, StoresSettings};
use bud::overrides::{
    CacheRepositoryBuilder, ConnectionBuilder, FilesystemBuilder, MailerTransportBuilder,
    PurgeableManager,
};
use bud::storage::{MemoryConfigTable, MemoryDisk};
use bud::tenancy::{Tenancy, TenancyContext, Tenant};
use bud::{
    AesGcmEncrypter, Bud, ConfigMap, ConfigStore, ConfigStoreManager, OverrideResolver, Result,
    StoreEnvironment,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn config(value: Value) -> ConfigMap {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

pub fn encrypter() -> Arc<AesGcmEncrypter> {
    let key = AesGcmEncrypter::generate_key().unwrap();
    Arc::new(AesGcmEncrypter::from_base64(&key).unwrap())
}

/// Environment with an in-memory `default` connection and `local` disk
pub fn memory_env() -> StoreEnvironment {
    StoreEnvironment::new(encrypter())
        .with_connection("default", Arc::new(MemoryConfigTable::new()))
        .with_disk("local", Arc::new(MemoryDisk::new()))
}

/// Tenant with a fixed identifier
#[derive(Debug)]
pub struct FakeTenant(pub String);

impl Tenant for FakeTenant {
    fn tenant_identifier(&self) -> String {
        self.0.clone()
    }
}

/// Tenancy that counts calls to `check` and `tenant`
#[derive(Debug)]
pub struct CountingTenancy {
    name: String,
    tenant: Option<Arc<dyn Tenant>>,
    checks: AtomicUsize,
    tenant_calls: AtomicUsize,
}

impl CountingTenancy {
    pub fn new(name: &str, tenant: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            tenant: tenant.map(|id| Arc::new(FakeTenant(id.to_string())) as Arc<dyn Tenant>),
            checks: AtomicUsize::new(0),
            tenant_calls: AtomicUsize::new(0),
        })
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    pub fn tenant_calls(&self) -> usize {
        self.tenant_calls.load(Ordering::SeqCst)
    }
}

impl Tenancy for CountingTenancy {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.tenant.is_some()
    }

    fn tenant(&self) -> Option<Arc<dyn Tenant>> {
        self.tenant_calls.fetch_add(1, Ordering::SeqCst);
        self.tenant.clone()
    }
}

type RecordTuple = (String, String, String, String);

/// Unencrypted config store that counts lookups
#[derive(Debug, Default)]
pub struct CountingStore {
    records: Mutex<HashMap<RecordTuple, ConfigMap>>,
    gets: AtomicUsize,
}

impl CountingStore {
    pub fn insert(&self, tenancy: &str, tenant: &str, service: &str, name: &str, config: ConfigMap) {
        self.records.lock().unwrap().insert(
            (tenancy.to_string(), tenant.to_string(), service.to_string(), name.to_string()),
            config,
        );
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    fn key(tenancy: &dyn Tenancy, tenant: &dyn Tenant, service: &str, name: &str) -> RecordTuple {
        (
            tenancy.name().to_string(),
            tenant.tenant_identifier(),
            service.to_string(),
            name.to_string(),
        )
    }
}

#[async_trait]
impl ConfigStore for CountingStore {
    fn name(&self) -> &str {
        "counting"
    }

    fn driver(&self) -> &str {
        "counting"
    }

    async fn get(
        &self,
        tenancy: &dyn Tenancy,
        tenant: &dyn Tenant,
        service: &str,
        name: &str,
    ) -> Result<Option<ConfigMap>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let key = Self::key(tenancy, tenant, service, name);
        Ok(self.records.lock().unwrap().get(&key).cloned())
    }

    async fn set(
        &self,
        tenancy: &dyn Tenancy,
        tenant: &dyn Tenant,
        service: &str,
        name: &str,
        config: &ConfigMap,
    ) -> Result<()> {
        let key = Self::key(tenancy, tenant, service, name);
        self.records.lock().unwrap().insert(key, config.clone());
        Ok(())
    }

    async fn forget(
        &self,
        tenancy: &dyn Tenancy,
        tenant: &dyn Tenant,
        service: &str,
        name: &str,
    ) -> Result<bool> {
        let key = Self::key(tenancy, tenant, service, name);
        Ok(self.records.lock().unwrap().remove(&key).is_some())
    }
}

/// Wiring shared by override tests
///
/// The default store is a [`CountingStore`] registered under `counting`; a
/// real encrypted `database` store over an in-memory table is also
/// configured.
pub struct Harness {
    pub store: Arc<CountingStore>,
    pub manager: Arc<ConfigStoreManager>,
    pub bud: Arc<Bud>,
    pub context: Arc<TenancyContext>,
    pub resolver: OverrideResolver,
}

impl Harness {
    pub fn new() -> Self {
        let settings = StoresSettings::new(Some("counting"))
            .with_store("counting", StoreSettings::new(None))
            .with_store(
                "database",
                StoreSettings::new(Some("database")).with_option("table", "tenant_config"),
            );
        let manager = Arc::new(ConfigStoreManager::new(settings, memory_env()));

        let store = Arc::new(CountingStore::default());
        let registered = store.clone();
        manager.register(
            "counting",
            Arc::new(move |_: &str, _: &StoreSettings, _: &StoreEnvironment| -> Result<Arc<dyn ConfigStore>> {
                Ok(registered.clone())
            }),
        );

        let bud = Arc::new(Bud::new(manager.clone()));
        let context = Arc::new(TenancyContext::new());
        let resolver = OverrideResolver::new(context.clone(), bud.clone());

        Self { store, manager, bud, context, resolver }
    }

    pub fn with_tenancy(tenancy: Arc<dyn Tenancy>) -> Self {
        let harness = Self::new();
        harness.context.set_current_tenancy(Some(tenancy));
        harness
    }
}

/// A connection produced by [`RecordingBuilder`]
#[derive(Debug, Clone, PartialEq)]
pub struct Built {
    pub name: Option<String>,
    pub config: ConfigMap,
    pub force: Option<bool>,
}

/// Records every build request it receives
#[derive(Debug, Default)]
pub struct RecordingBuilder {
    calls: Mutex<Vec<Built>>,
}

impl RecordingBuilder {
    pub fn calls(&self) -> Vec<Built> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, built: Built) -> Result<Built> {
        self.calls.lock().unwrap().push(built.clone());
        Ok(built)
    }
}

impl ConnectionBuilder for RecordingBuilder {
    type Connection = Built;

    fn connect_using(&self, name: &str, config: ConfigMap, force: bool) -> Result<Built> {
        self.record(Built { name: Some(name.to_string()), config, force: Some(force) })
    }
}

impl FilesystemBuilder for RecordingBuilder {
    type Filesystem = Built;

    fn build(&self, config: ConfigMap) -> Result<Built> {
        self.record(Built { name: None, config, force: None })
    }
}

impl MailerTransportBuilder for RecordingBuilder {
    type Transport = Built;

    fn build_transport(&self, config: ConfigMap) -> Result<Built> {
        self.record(Built { name: None, config, force: None })
    }
}

impl CacheRepositoryBuilder for RecordingBuilder {
    type Repository = Built;

    fn build(&self, config: ConfigMap) -> Result<Built> {
        self.record(Built { name: None, config, force: None })
    }
}

/// External manager that records purged names
#[derive(Debug, Default)]
pub struct RecordingManager {
    purged: Mutex<Vec<String>>,
}

impl RecordingManager {
    pub fn purged(&self) -> Vec<String> {
        self.purged.lock().unwrap().clone()
    }
}

impl PurgeableManager for RecordingManager {
    fn purge(&self, name: &str) -> Result<()> {
        self.purged.lock().unwrap().push(name.to_string());
        Ok(())
    }
}
