//! Per-service override creators
//!
//! A creator is what a host's service manager invokes for a service
//! configured with the `bud` driver. It tracks the name, resolves the tenant's
//! config and hands the merged config to the host's builder.

use super::lifecycle::NameTracker;
use super::resolver::{OverrideResolver, ServiceKind};
use crate::errors::{Misconfiguration, Result};
use crate::stores::ConfigMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Builds database connections from resolved config
pub trait ConnectionBuilder: Send + Sync {
    type Connection;

    /// Connect using `config` under `name`; `force` replaces any existing
    /// connection of the same name
    fn connect_using(&self, name: &str, config: ConfigMap, force: bool)
        -> Result<Self::Connection>;
}

/// Builds filesystem adapters from resolved config
pub trait FilesystemBuilder: Send + Sync {
    type Filesystem;

    fn build(&self, config: ConfigMap) -> Result<Self::Filesystem>;
}

/// Builds mailer transports from resolved config
pub trait MailerTransportBuilder: Send + Sync {
    type Transport;

    fn build_transport(&self, config: ConfigMap) -> Result<Self::Transport>;
}

/// Builds cache repositories from resolved config
pub trait CacheRepositoryBuilder: Send + Sync {
    type Repository;

    fn build(&self, config: ConfigMap) -> Result<Self::Repository>;
}

macro_rules! creator_debug {
    ($creator:ident, $bound:ident) => {
        impl<B: $bound> fmt::Debug for $creator<B> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($creator))
                    .field("resolver", &self.resolver)
                    .field("tracked", &self.tracker.names())
                    .finish_non_exhaustive()
            }
        }
    };
}

/// Creates tenant-specific database connections
pub struct DatabaseConnectionCreator<B: ConnectionBuilder> {
    builder: Arc<B>,
    resolver: OverrideResolver,
    tracker: NameTracker,
}

creator_debug!(DatabaseConnectionCreator, ConnectionBuilder);

impl<B: ConnectionBuilder> DatabaseConnectionCreator<B> {
    pub fn new(builder: Arc<B>, resolver: OverrideResolver, tracker: NameTracker) -> Self {
        Self { builder, resolver, tracker }
    }

    /// Create the connection `name` configured as `config`
    pub async fn create(&self, name: &str, config: &ConfigMap) -> Result<B::Connection> {
        self.tracker.track(name);

        let config = self.resolver.resolve(ServiceKind::Database, name, config).await?;

        self.builder.connect_using(name, config, true)
    }
}

/// Creates tenant-specific filesystem disks
pub struct FilesystemDiskCreator<B: FilesystemBuilder> {
    builder: Arc<B>,
    resolver: OverrideResolver,
    tracker: NameTracker,
}

creator_debug!(FilesystemDiskCreator, FilesystemBuilder);

impl<B: FilesystemBuilder> FilesystemDiskCreator<B> {
    pub fn new(builder: Arc<B>, resolver: OverrideResolver, tracker: NameTracker) -> Self {
        Self { builder, resolver, tracker }
    }

    /// Create the disk `name` configured as `config`
    ///
    /// The built config carries the disk's `name` unless the tenant's record
    /// sets one.
    pub async fn create(&self, name: &str, config: &ConfigMap) -> Result<B::Filesystem> {
        self.tracker.track(name);

        let resolved = self.resolver.resolve(ServiceKind::Filesystem, name, config).await?;

        let mut config = ConfigMap::new();
        config.insert("name".to_string(), Value::from(name));
        config.extend(resolved);

        self.builder.build(config)
    }
}

/// Creates tenant-specific mailer transports
pub struct MailerTransportCreator<B: MailerTransportBuilder> {
    builder: Arc<B>,
    resolver: OverrideResolver,
    tracker: NameTracker,
}

creator_debug!(MailerTransportCreator, MailerTransportBuilder);

impl<B: MailerTransportBuilder> MailerTransportCreator<B> {
    pub fn new(builder: Arc<B>, resolver: OverrideResolver, tracker: NameTracker) -> Self {
        Self { builder, resolver, tracker }
    }

    /// Create a transport for the mailer named by `config["name"]`
    pub async fn create(&self, config: &ConfigMap) -> Result<B::Transport> {
        let name = config
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Misconfiguration::MissingName {
                service: ServiceKind::Mailer.as_str().to_string(),
            })?;

        self.tracker.track(name);

        let config = self.resolver.resolve(ServiceKind::Mailer, name, config).await?;

        self.builder.build_transport(config)
    }
}

/// Creates tenant-specific cache repositories
pub struct CacheStoreCreator<B: CacheRepositoryBuilder> {
    builder: Arc<B>,
    resolver: OverrideResolver,
    tracker: NameTracker,
}

creator_debug!(CacheStoreCreator, CacheRepositoryBuilder);

impl<B: CacheRepositoryBuilder> CacheStoreCreator<B> {
    pub fn new(builder: Arc<B>, resolver: OverrideResolver, tracker: NameTracker) -> Self {
        Self { builder, resolver, tracker }
    }

    /// Create the cache store `name` configured as `config`
    pub async fn create(&self, name: &str, config: &ConfigMap) -> Result<B::Repository> {
        self.tracker.track(name);

        let config = self.resolver.resolve(ServiceKind::Cache, name, config).await?;

        self.builder.build(config)
    }
}
