//! # Bud
//!
//! Per-tenant service configuration for multi-tenant applications. Tenant
//! config for database connections, filesystem disks, mailers and cache
//! stores is kept encrypted in a config store, and substituted when the host
//! application builds a named service configured with the `bud` driver.
//!
//! ## Architecture
//!
//! ```text
//! Host service manager → Creator → OverrideResolver → Bud → ConfigStoreManager → ConfigStore
//!                           ↓                                                        ↓
//!                     NameTracker ← OverrideRegistry (tenant change)        ConfigTable / Disk
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use bud::{Bud, ConfigStoreManager, OverrideResolver, ServiceKind, Settings, StoreEnvironment};
//! use bud::tenancy::{BasicTenancy, BasicTenant, TenancyContext};
//! use std::sync::Arc;
//!
//! # async fn example() -> bud::Result<()> {
//! let settings = Settings::load(Some("bud.toml".as_ref()))?;
//! let env = StoreEnvironment::from_settings(&settings).await?;
//! let bud = Arc::new(Bud::new(Arc::new(ConfigStoreManager::new(settings.stores_settings(), env))));
//!
//! let tenancy = BasicTenancy::with_tenant("tenants", Arc::new(BasicTenant::new("42")));
//! let context = Arc::new(TenancyContext::with_tenancy(Arc::new(tenancy)));
//!
//! let resolver = OverrideResolver::new(context, bud);
//! let config = resolver.resolve(ServiceKind::Database, "tenant_db", &Default::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod bud;
pub mod cli;
pub mod config;
pub mod errors;
pub mod observability;
pub mod overrides;
pub mod services;
pub mod storage;
pub mod stores;
pub mod tenancy;

// Re-export commonly used types and traits
pub use crate::bud::Bud;
pub use config::{Settings, StoreSettings, StoresSettings};
pub use errors::{BudError, Misconfiguration, Result};
pub use observability::init_logging;
pub use overrides::{OverrideRegistry, OverrideResolver, ServiceKind, ServiceOverride};
pub use services::{AesGcmEncrypter, Encrypter};
pub use stores::{ConfigMap, ConfigStore, ConfigStoreManager, StoreEnvironment};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
