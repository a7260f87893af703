//! Override resolution
//!
//! Resolves the config a tenant-aware service should be built with: the
//! caller's base config overlaid by the current tenant's stored record.

use crate::bud::Bud;
use crate::errors::{BudError, Misconfiguration, Result};
use crate::stores::ConfigMap;
use crate::tenancy::TenantContext;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Base config key naming the store to read overrides from
pub const STORE_OPTION: &str = "budStore";

/// Driver value that routes a service through the override mechanism
pub const BUD_DRIVER: &str = "bud";

/// Kind of service an override resolves config for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Database,
    Filesystem,
    Mailer,
    Cache,
}

impl ServiceKind {
    /// Service name records are stored under
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Filesystem => "filesystem",
            Self::Mailer => "mailer",
            Self::Cache => "cache",
        }
    }

    /// What an instance of the service is called in errors
    pub fn term(&self) -> &'static str {
        match self {
            Self::Database => "database connection",
            Self::Filesystem => "filesystem disk",
            Self::Mailer => "mailer",
            Self::Cache => "cache store",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = BudError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "database" => Ok(Self::Database),
            "filesystem" => Ok(Self::Filesystem),
            "mailer" => Ok(Self::Mailer),
            "cache" => Ok(Self::Cache),
            other => Err(BudError::validation_field(
                format!("Unknown service '{}'", other),
                "service",
            )),
        }
    }
}

/// Reject config whose driver would route straight back into the override
pub fn check_for_cyclic_driver(config: &ConfigMap, service: ServiceKind, name: &str) -> Result<()> {
    if config.get("driver").and_then(Value::as_str) == Some(BUD_DRIVER) {
        return Err(BudError::cyclic(service.term(), name));
    }
    Ok(())
}

/// Resolves tenant-specific service config
#[derive(Clone)]
pub struct OverrideResolver {
    context: Arc<dyn TenantContext>,
    bud: Arc<Bud>,
}

impl fmt::Debug for OverrideResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverrideResolver").field("bud", &self.bud).finish_non_exhaustive()
    }
}

impl OverrideResolver {
    pub fn new(context: Arc<dyn TenantContext>, bud: Arc<Bud>) -> Self {
        Self { context, bud }
    }

    pub fn bud(&self) -> &Arc<Bud> {
        &self.bud
    }

    /// Resolve the config for a named service instance
    ///
    /// Requires a current tenancy with an authenticated tenant and a stored
    /// record for the tenant. Record values win over `base` key by key, and
    /// the merged config must not select the `bud` driver again.
    #[instrument(skip(self, base))]
    pub async fn resolve(
        &self,
        service: ServiceKind,
        name: &str,
        base: &ConfigMap,
    ) -> Result<ConfigMap> {
        if !self.context.within_context() {
            return Err(BudError::TenancyMissing);
        }

        let tenancy = self.context.current_tenancy().ok_or(BudError::TenancyMissing)?;

        if !tenancy.check() {
            return Err(BudError::tenant_missing(tenancy.name()));
        }

        let tenant = tenancy.tenant().ok_or_else(|| BudError::tenant_missing(tenancy.name()))?;

        let store = self.bud.store(selected_store(base, service, name)?)?;

        let record = store
            .get(tenancy.as_ref(), tenant.as_ref(), service.as_str(), name)
            .await?
            .ok_or_else(|| BudError::RecordNotFound {
                service: service.as_str().to_string(),
                name: name.to_string(),
                tenant: tenant.tenant_identifier(),
                tenancy: tenancy.name().to_string(),
            })?;

        let mut merged = base.clone();
        merged.extend(record);

        check_for_cyclic_driver(&merged, service, name)?;

        debug!(
            store = %store.name(),
            tenancy = %tenancy.name(),
            name = %name,
            "Resolved tenant override"
        );

        Ok(merged)
    }
}

/// Store named by the base config, if any
///
/// A missing or null `budStore` selects the default store; any other
/// non-string value is rejected.
pub fn selected_store<'a>(
    base: &'a ConfigMap,
    service: ServiceKind,
    name: &str,
) -> Result<Option<&'a str>> {
    match base.get(STORE_OPTION) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(store)) => Ok(Some(store.as_str())),
        Some(other) => Err(Misconfiguration::invalid_value(
            format!("{}::{}", service, name),
            STORE_OPTION,
            format!("expected a store name, got {}", other),
        )
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> ConfigMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_service_kind_names() {
        assert_eq!(ServiceKind::Database.as_str(), "database");
        assert_eq!(ServiceKind::Filesystem.term(), "filesystem disk");
        assert_eq!("cache".parse::<ServiceKind>().unwrap(), ServiceKind::Cache);
        assert!("queue".parse::<ServiceKind>().is_err());
    }

    #[test]
    fn test_cyclic_driver_detected() {
        let err = check_for_cyclic_driver(
            &config(json!({"driver": "bud"})),
            ServiceKind::Database,
            "tenant_db",
        )
        .unwrap_err();

        assert_eq!(err.to_string(), "Attempt to create cyclic bud database connection [tenant_db] detected");
    }

    #[test]
    fn test_selected_store() {
        let named = config(json!({"budStore": "database"}));
        assert_eq!(selected_store(&named, ServiceKind::Cache, "main").unwrap(), Some("database"));
        assert_eq!(selected_store(&config(json!({})), ServiceKind::Cache, "main").unwrap(), None);
        assert_eq!(
            selected_store(&config(json!({"budStore": null})), ServiceKind::Cache, "main").unwrap(),
            None
        );
    }

    #[test]
    fn test_non_string_store_is_rejected() {
        for value in [json!(5), json!(true), json!(["database"])] {
            let base = config(json!({"budStore": value}));

            let err = selected_store(&base, ServiceKind::Database, "tenant_db").unwrap_err();

            assert!(matches!(
                err,
                BudError::Misconfiguration(Misconfiguration::InvalidValue { ref store, ref option, .. })
                    if store == "database::tenant_db" && option == STORE_OPTION
            ));
        }
    }

    #[test]
    fn test_other_drivers_are_not_cyclic() {
        assert!(check_for_cyclic_driver(&config(json!({"driver": "mysql"})), ServiceKind::Cache, "main").is_ok());
        assert!(check_for_cyclic_driver(&config(json!({"host": "bud"})), ServiceKind::Cache, "main").is_ok());
        assert!(check_for_cyclic_driver(&config(json!({"driver": null})), ServiceKind::Cache, "main").is_ok());
    }
}
