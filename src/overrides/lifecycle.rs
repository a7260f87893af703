//! Service override lifecycle
//!
//! Every name built through an override is tracked, so that when the active
//! tenant changes the external manager can drop it and rebuild it for the
//! next tenant.

use super::resolver::ServiceKind;
use crate::errors::Result;
use crate::stores::ConfigStoreManager;
use crate::tenancy::{Tenancy, Tenant};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Ordered, de-duplicated list of names built through an override
#[derive(Debug, Clone, Default)]
pub struct NameTracker {
    names: Arc<Mutex<Vec<String>>>,
}

impl NameTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        // The list is only ever pushed to or swapped out whole
        self.names.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a name, keeping first-seen order
    pub fn track(&self, name: &str) {
        let mut names = self.lock();
        if !names.iter().any(|tracked| tracked == name) {
            names.push(name.to_string());
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove and return every tracked name
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }
}

/// An external manager holding named service instances
pub trait PurgeableManager: Send + Sync {
    /// Drop the instance built under `name`, if there is one
    fn purge(&self, name: &str) -> Result<()>;
}

/// Tracks and purges the instances one service kind built through bud
pub struct ServiceOverride {
    service: ServiceKind,
    tracker: NameTracker,
    manager: Arc<dyn PurgeableManager>,
}

impl fmt::Debug for ServiceOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceOverride")
            .field("service", &self.service)
            .field("tracked", &self.tracker.names())
            .finish()
    }
}

impl ServiceOverride {
    pub fn new(service: ServiceKind, manager: Arc<dyn PurgeableManager>) -> Self {
        Self { service, tracker: NameTracker::new(), manager }
    }

    pub fn service(&self) -> ServiceKind {
        self.service
    }

    /// Tracker to hand to the creator for this service
    pub fn tracker(&self) -> NameTracker {
        self.tracker.clone()
    }

    /// Purge every tracked name from the manager and forget them
    ///
    /// Failed purges are logged and skipped. Returns how many names were
    /// purged.
    pub fn cleanup(&self, tenancy: &dyn Tenancy, tenant: &dyn Tenant) -> usize {
        let names = self.tracker.take();
        let mut purged = 0;

        for name in &names {
            match self.manager.purge(name) {
                Ok(()) => purged += 1,
                Err(e) => warn!(
                    service = %self.service,
                    name = %name,
                    tenancy = %tenancy.name(),
                    error = %e,
                    "Failed to purge tenant service"
                ),
            }
        }

        debug!(
            service = %self.service,
            tenancy = %tenancy.name(),
            tenant = %tenant.tenant_identifier(),
            purged,
            "Cleaned up service override"
        );

        purged
    }
}

/// The overrides to clean up when the active tenant changes
#[derive(Debug, Default)]
pub struct OverrideRegistry {
    overrides: Vec<ServiceOverride>,
    stores: Option<Arc<ConfigStoreManager>>,
}

impl OverrideRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also flush the store manager's resolved stores on tenant change
    pub fn with_store_manager(mut self, stores: Arc<ConfigStoreManager>) -> Self {
        self.stores = Some(stores);
        self
    }

    pub fn register(&mut self, service_override: ServiceOverride) {
        info!(service = %service_override.service(), "Registering service override");
        self.overrides.push(service_override);
    }

    pub fn get(&self, service: ServiceKind) -> Option<&ServiceOverride> {
        self.overrides.iter().find(|o| o.service() == service)
    }

    /// Clean up after the previous tenant of a tenancy
    ///
    /// Nothing was built for a tenancy that had no tenant, so `None` is a
    /// no-op.
    pub fn tenant_changed(&self, tenancy: &dyn Tenancy, previous: Option<&dyn Tenant>) -> usize {
        let Some(previous) = previous else {
            return 0;
        };

        let purged =
            self.overrides.iter().map(|o| o.cleanup(tenancy, previous)).sum::<usize>();

        if let Some(stores) = &self.stores {
            stores.flush_resolved();
        }

        info!(
            tenancy = %tenancy.name(),
            tenant = %previous.tenant_identifier(),
            purged,
            "Purged services built for previous tenant"
        );

        purged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BudError;
    use crate::tenancy::{BasicTenancy, BasicTenant};

    #[derive(Default)]
    struct RecordingManager {
        purged: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl PurgeableManager for RecordingManager {
        fn purge(&self, name: &str) -> Result<()> {
            if self.fail_on.as_deref() == Some(name) {
                return Err(BudError::internal("purge failed"));
            }
            self.purged.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_tracker_keeps_order_without_duplicates() {
        let tracker = NameTracker::new();
        tracker.track("tenant_db");
        tracker.track("reporting");
        tracker.track("tenant_db");

        assert_eq!(tracker.names(), vec!["tenant_db", "reporting"]);
        assert_eq!(tracker.take(), vec!["tenant_db", "reporting"]);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_tracker_keeps_names_after_panic() {
        let tracker = NameTracker::new();
        tracker.track("tenant_db");

        let holder = tracker.clone();
        let joined = std::thread::spawn(move || {
            let _names = holder.names.lock().unwrap();
            panic!("poison the tracker");
        })
        .join();
        assert!(joined.is_err());

        tracker.track("reporting");
        assert_eq!(tracker.names(), vec!["tenant_db", "reporting"]);
        assert_eq!(tracker.take().len(), 2);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_cleanup_purges_and_clears() {
        let manager = Arc::new(RecordingManager::default());
        let service_override = ServiceOverride::new(ServiceKind::Database, manager.clone());
        let tenancy = BasicTenancy::new("acme");
        let tenant = BasicTenant::new("42");

        service_override.tracker().track("tenant_db");
        service_override.tracker().track("reporting");

        assert_eq!(service_override.cleanup(&tenancy, &tenant), 2);
        assert_eq!(*manager.purged.lock().unwrap(), vec!["tenant_db", "reporting"]);

        // Idempotent once cleared
        assert_eq!(service_override.cleanup(&tenancy, &tenant), 0);
        assert_eq!(manager.purged.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_failed_purge_is_skipped() {
        let manager =
            Arc::new(RecordingManager { fail_on: Some("broken".to_string()), ..Default::default() });
        let service_override = ServiceOverride::new(ServiceKind::Mailer, manager.clone());

        service_override.tracker().track("broken");
        service_override.tracker().track("smtp");

        let purged =
            service_override.cleanup(&BasicTenancy::new("acme"), &BasicTenant::new("42"));
        assert_eq!(purged, 1);
        assert_eq!(*manager.purged.lock().unwrap(), vec!["smtp"]);
        assert!(service_override.tracker().is_empty());
    }

    #[test]
    fn test_no_previous_tenant_is_noop() {
        let manager = Arc::new(RecordingManager::default());
        let mut registry = OverrideRegistry::new();
        let service_override = ServiceOverride::new(ServiceKind::Cache, manager.clone());
        service_override.tracker().track("main");
        registry.register(service_override);

        assert_eq!(registry.tenant_changed(&BasicTenancy::new("acme"), None), 0);
        assert!(manager.purged.lock().unwrap().is_empty());
        assert!(!registry.get(ServiceKind::Cache).unwrap().tracker().is_empty());

        let previous = BasicTenant::new("42");
        assert_eq!(registry.tenant_changed(&BasicTenancy::new("acme"), Some(&previous)), 1);
        assert!(registry.get(ServiceKind::Database).is_none());
    }
}
