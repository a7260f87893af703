//! Bud facade
//!
//! Entry point host code holds on to: access to the config stores plus the
//! tenancy and tenant the current request is working with.

use crate::errors::{BudError, Result};
use crate::stores::{ConfigMap, ConfigStore, ConfigStoreManager};
use crate::tenancy::{Tenancy, Tenant};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Tenant-aware access to config stores
pub struct Bud {
    stores: Arc<ConfigStoreManager>,
    tenancy: RwLock<Option<Arc<dyn Tenancy>>>,
    tenant: RwLock<Option<Arc<dyn Tenant>>>,
}

impl fmt::Debug for Bud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bud")
            .field("stores", &self.stores)
            .field("tenancy", &self.tenancy().map(|t| t.name().to_string()))
            .field("tenant", &self.tenant().map(|t| t.tenant_identifier()))
            .finish()
    }
}

impl Bud {
    pub fn new(stores: Arc<ConfigStoreManager>) -> Self {
        Self { stores, tenancy: RwLock::new(None), tenant: RwLock::new(None) }
    }

    /// The store manager
    pub fn stores(&self) -> &Arc<ConfigStoreManager> {
        &self.stores
    }

    /// Get a config store, or the default store when `name` is `None`
    pub fn store(&self, name: Option<&str>) -> Result<Arc<dyn ConfigStore>> {
        self.stores.get(name)
    }

    pub fn set_tenancy(&self, tenancy: Option<Arc<dyn Tenancy>>) {
        *self.tenancy.write().unwrap_or_else(PoisonError::into_inner) = tenancy;
    }

    pub fn set_tenant(&self, tenant: Option<Arc<dyn Tenant>>) {
        *self.tenant.write().unwrap_or_else(PoisonError::into_inner) = tenant;
    }

    pub fn tenancy(&self) -> Option<Arc<dyn Tenancy>> {
        self.tenancy.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn tenant(&self) -> Option<Arc<dyn Tenant>> {
        self.tenant.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn has_tenancy(&self) -> bool {
        self.tenancy().is_some()
    }

    pub fn has_tenant(&self) -> bool {
        self.tenant().is_some()
    }

    /// Fetch config for the current tenant, falling back to `default`
    ///
    /// Reads from the named store, or the default store when `store` is
    /// `None`.
    pub async fn config(
        &self,
        service: &str,
        name: &str,
        default: Option<ConfigMap>,
        store: Option<&str>,
    ) -> Result<Option<ConfigMap>> {
        let tenancy = self.tenancy().ok_or(BudError::TenancyMissing)?;
        let tenant = self.tenant().ok_or_else(|| BudError::tenant_missing(tenancy.name()))?;

        debug!(
            tenancy = %tenancy.name(),
            service = %service,
            name = %name,
            "Fetching tenant config"
        );

        self.store(store)?
            .get_or(tenancy.as_ref(), tenant.as_ref(), service, name, default)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StoreSettings, StoresSettings};
    use crate::services::AesGcmEncrypter;
    use crate::storage::MemoryConfigTable;
    use crate::stores::StoreEnvironment;
    use crate::tenancy::{BasicTenancy, BasicTenant};
    use serde_json::json;

    fn bud() -> Bud {
        let key = AesGcmEncrypter::generate_key().unwrap();
        let env = StoreEnvironment::new(Arc::new(AesGcmEncrypter::from_base64(&key).unwrap()))
            .with_connection("default", Arc::new(MemoryConfigTable::new()));
        let settings = StoresSettings::new(Some("database")).with_store(
            "database",
            StoreSettings::new(None).with_option("table", "tenant_config"),
        );

        Bud::new(Arc::new(ConfigStoreManager::new(settings, env)))
    }

    #[tokio::test]
    async fn test_config_requires_tenancy() {
        let bud = bud();

        let err = bud.config("database", "tenant_db", None, None).await.unwrap_err();
        assert!(matches!(err, BudError::TenancyMissing));
        assert!(!bud.stores().has_resolved(None));
    }

    #[tokio::test]
    async fn test_config_requires_tenant() {
        let bud = bud();
        bud.set_tenancy(Some(Arc::new(BasicTenancy::new("acme"))));

        let err = bud.config("database", "tenant_db", None, None).await.unwrap_err();
        assert_eq!(err.to_string(), "There is no current tenant for tenancy [acme]");
    }

    #[tokio::test]
    async fn test_config_reads_current_tenant() {
        let bud = bud();
        let tenancy: Arc<dyn Tenancy> = Arc::new(BasicTenancy::new("acme"));
        let tenant: Arc<dyn Tenant> = Arc::new(BasicTenant::new("42"));
        bud.set_tenancy(Some(tenancy.clone()));
        bud.set_tenant(Some(tenant.clone()));

        let record = json!({"driver": "smtp"}).as_object().cloned().unwrap();
        bud.store(None)
            .unwrap()
            .set(tenancy.as_ref(), tenant.as_ref(), "mailer", "smtp", &record)
            .await
            .unwrap();

        assert_eq!(bud.config("mailer", "smtp", None, None).await.unwrap(), Some(record));

        let fallback = json!({"driver": "log"}).as_object().cloned().unwrap();
        assert_eq!(
            bud.config("mailer", "log", Some(fallback.clone()), Some("database")).await.unwrap(),
            Some(fallback)
        );
    }

    #[test]
    fn test_clearing_tenant() {
        let bud = bud();
        bud.set_tenant(Some(Arc::new(BasicTenant::new("42"))));
        assert!(bud.has_tenant());

        bud.set_tenant(None);
        assert!(!bud.has_tenant());
        assert!(!bud.has_tenancy());
    }

    #[test]
    fn test_setters_apply_after_panic() {
        let bud = bud();
        let joined = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _tenant = bud.tenant.write().unwrap();
                    panic!("poison the tenant slot");
                })
                .join()
        });
        assert!(joined.is_err());

        bud.set_tenant(Some(Arc::new(BasicTenant::new("42"))));
        bud.set_tenancy(Some(Arc::new(BasicTenancy::new("acme"))));

        assert_eq!(bud.tenant().map(|t| t.tenant_identifier()), Some("42".to_string()));
        assert_eq!(bud.tenancy().map(|t| t.name().to_string()), Some("acme".to_string()));
    }
}
