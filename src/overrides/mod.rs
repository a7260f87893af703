//! # Service Overrides
//!
//! Tenant-aware construction of named services. A host routes services
//! configured with the `bud` driver to a creator, which resolves the current
//! tenant's config through [`OverrideResolver`] and builds the service from
//! it. [`OverrideRegistry`] purges what was built when the tenant changes.

pub mod creators;
pub mod lifecycle;
pub mod resolver;

pub use creators::{
    CacheRepositoryBuilder, CacheStoreCreator, ConnectionBuilder, DatabaseConnectionCreator,
    FilesystemBuilder, FilesystemDiskCreator, MailerTransportBuilder, MailerTransportCreator,
};
pub use lifecycle::{NameTracker, OverrideRegistry, PurgeableManager, ServiceOverride};
pub use resolver::{
    check_for_cyclic_driver, selected_store, OverrideResolver, ServiceKind, BUD_DRIVER, STORE_OPTION,
};
