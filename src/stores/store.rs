//! Config store trait
//!
//! Defines the interface every config store driver implements.

use super::codec::ConfigMap;
use crate::errors::Result;
use crate::tenancy::{Tenancy, Tenant};
use async_trait::async_trait;
use std::fmt;

/// A backing medium for tenant-scoped, encrypted config records
///
/// Stores never cache values: every `get` performs a fresh lookup, so config
/// changed between requests is picked up immediately.
#[async_trait]
pub trait ConfigStore: Send + Sync + fmt::Debug {
    /// Registered name of the store
    fn name(&self) -> &str;

    /// Driver that created the store
    fn driver(&self) -> &str;

    /// Fetch the config stored for a tenant's service/name pair
    ///
    /// A missing or undecodable record is `Ok(None)`; errors are reserved for
    /// failures of the backing medium itself.
    async fn get(
        &self,
        tenancy: &dyn Tenancy,
        tenant: &dyn Tenant,
        service: &str,
        name: &str,
    ) -> Result<Option<ConfigMap>>;

    /// Like [`ConfigStore::get`], returning `default` when there is no record
    async fn get_or(
        &self,
        tenancy: &dyn Tenancy,
        tenant: &dyn Tenant,
        service: &str,
        name: &str,
        default: Option<ConfigMap>,
    ) -> Result<Option<ConfigMap>> {
        Ok(self.get(tenancy, tenant, service, name).await?.or(default))
    }

    /// Store config for a tenant's service/name pair, replacing any existing
    /// record
    async fn set(
        &self,
        tenancy: &dyn Tenancy,
        tenant: &dyn Tenant,
        service: &str,
        name: &str,
        config: &ConfigMap,
    ) -> Result<()>;

    /// Remove the record for a tenant's service/name pair, returning whether
    /// one existed
    async fn forget(
        &self,
        tenancy: &dyn Tenancy,
        tenant: &dyn Tenant,
        service: &str,
        name: &str,
    ) -> Result<bool>;
}
