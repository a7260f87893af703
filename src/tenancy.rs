//! # Tenancy Contracts
//!
//! The multitenancy context Bud resolves against. Host applications usually
//! provide their own implementations of [`TenantContext`], [`Tenancy`] and
//! [`Tenant`]; [`TenancyContext`], [`BasicTenancy`] and [`BasicTenant`] are
//! small owned implementations used by the admin CLI and by tests.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

/// An entity that can be a tenant
pub trait Tenant: Send + Sync + fmt::Debug {
    /// Stable identifier used to key stored config
    fn tenant_identifier(&self) -> String;
}

/// A multitenancy boundary, such as "subdomain based tenancy"
pub trait Tenancy: Send + Sync + fmt::Debug {
    /// Registered name of the tenancy
    fn name(&self) -> &str;

    /// Whether the tenancy currently has an authenticated tenant
    fn check(&self) -> bool;

    /// The currently authenticated tenant
    fn tenant(&self) -> Option<Arc<dyn Tenant>>;
}

/// Provides the current multitenancy context
pub trait TenantContext: Send + Sync {
    /// Whether execution is currently within a multitenanted context
    fn within_context(&self) -> bool;

    /// The tenancy that is currently active, if any
    fn current_tenancy(&self) -> Option<Arc<dyn Tenancy>>;
}

/// Tenant with a fixed identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BasicTenant {
    identifier: String,
}

impl BasicTenant {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self { identifier: identifier.into() }
    }
}

impl Tenant for BasicTenant {
    fn tenant_identifier(&self) -> String {
        self.identifier.clone()
    }
}

/// Tenancy whose tenant can be swapped at runtime
#[derive(Debug)]
pub struct BasicTenancy {
    name: String,
    tenant: RwLock<Option<Arc<dyn Tenant>>>,
}

impl BasicTenancy {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), tenant: RwLock::new(None) }
    }

    /// Create a tenancy with an authenticated tenant already set
    pub fn with_tenant(name: impl Into<String>, tenant: Arc<dyn Tenant>) -> Self {
        Self { name: name.into(), tenant: RwLock::new(Some(tenant)) }
    }

    /// Replace the authenticated tenant, returning the previous one
    pub fn set_tenant(&self, tenant: Option<Arc<dyn Tenant>>) -> Option<Arc<dyn Tenant>> {
        let mut current = self.tenant.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, tenant)
    }
}

impl Tenancy for BasicTenancy {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> bool {
        self.tenant.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    fn tenant(&self) -> Option<Arc<dyn Tenant>> {
        self.tenant.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[derive(Default)]
struct ContextState {
    marked: Option<bool>,
    tenancy: Option<Arc<dyn Tenancy>>,
}

/// Owned tenant context provider
///
/// `within_context` follows an explicit mark when one was made, and otherwise
/// reports whether a tenancy is currently set.
#[derive(Default)]
pub struct TenancyContext {
    state: RwLock<ContextState>,
}

impl fmt::Debug for TenancyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tenancy = self.current_tenancy();
        f.debug_struct("TenancyContext")
            .field("within_context", &self.within_context())
            .field("tenancy", &tenancy.as_ref().map(|t| t.name().to_string()))
            .finish()
    }
}

impl TenancyContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context with the given tenancy active
    pub fn with_tenancy(tenancy: Arc<dyn Tenancy>) -> Self {
        let context = Self::new();
        context.set_current_tenancy(Some(tenancy));
        context
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, ContextState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_current_tenancy(&self, tenancy: Option<Arc<dyn Tenancy>>) {
        self.state_mut().tenancy = tenancy;
    }

    pub fn mark_as_in_context(&self) {
        self.state_mut().marked = Some(true);
    }

    pub fn mark_as_outside_context(&self) {
        self.state_mut().marked = Some(false);
    }
}

impl TenantContext for TenancyContext {
    fn within_context(&self) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.marked.unwrap_or(state.tenancy.is_some())
    }

    fn current_tenancy(&self) -> Option<Arc<dyn Tenancy>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).tenancy.clone()
    }
}
