//! Record keys shared by every backing medium.

use crate::tenancy::{Tenancy, Tenant};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one stored config record
///
/// At most one live record exists per key in a given backing medium.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub service: String,
    pub name: String,
    pub tenant_id: String,
    pub tenancy: String,
}

impl RecordKey {
    pub fn new(
        service: impl Into<String>,
        name: impl Into<String>,
        tenant_id: impl Into<String>,
        tenancy: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            name: name.into(),
            tenant_id: tenant_id.into(),
            tenancy: tenancy.into(),
        }
    }

    /// Key for a service/name pair belonging to the given tenant
    pub fn for_tenant(tenancy: &dyn Tenancy, tenant: &dyn Tenant, service: &str, name: &str) -> Self {
        Self::new(service, name, tenant.tenant_identifier(), tenancy.name())
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.tenancy, self.tenant_id, self.service, self.name)
    }
}
