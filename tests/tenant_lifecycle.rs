//! Integration tests for purging tenant-built services on tenant change

mod common;

use bud::overrides::{DatabaseConnectionCreator, MailerTransportCreator, ServiceOverride};
use bud::tenancy::Tenant;
use bud::{OverrideRegistry, ServiceKind};
use common::{config, CountingTenancy, FakeTenant, Harness, RecordingBuilder, RecordingManager};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_tenant_change_purges_built_services() {
    let tenancy = CountingTenancy::new("acme", Some("42"));
    let harness = Harness::with_tenancy(tenancy.clone());
    harness.store.insert("acme", "42", "database", "tenant_db", config(json!({"driver": "mysql"})));
    harness.store.insert("acme", "42", "mailer", "smtp", config(json!({"transport": "smtp"})));

    let db = Arc::new(RecordingManager::default());
    let mail = Arc::new(RecordingManager::default());
    let db_override = ServiceOverride::new(ServiceKind::Database, db.clone());
    let mail_override = ServiceOverride::new(ServiceKind::Mailer, mail.clone());

    let builder = Arc::new(RecordingBuilder::default());
    let connections = DatabaseConnectionCreator::new(
        builder.clone(),
        harness.resolver.clone(),
        db_override.tracker(),
    );
    let mailers =
        MailerTransportCreator::new(builder.clone(), harness.resolver.clone(), mail_override.tracker());

    connections.create("tenant_db", &config(json!({"driver": "bud"}))).await.unwrap();
    connections.create("tenant_db", &config(json!({"driver": "bud"}))).await.unwrap();
    mailers.create(&config(json!({"transport": "bud", "name": "smtp"}))).await.unwrap();

    let mut registry = OverrideRegistry::new().with_store_manager(harness.manager.clone());
    registry.register(db_override);
    registry.register(mail_override);
    assert!(harness.manager.has_resolved(None));

    let previous = FakeTenant("42".to_string());
    let purged = registry.tenant_changed(&*tenancy, Some(&previous as &dyn Tenant));

    assert_eq!(purged, 2);
    assert_eq!(db.purged(), vec!["tenant_db"]);
    assert_eq!(mail.purged(), vec!["smtp"]);
    assert!(!harness.manager.has_resolved(None));

    // A second change has nothing left to purge
    assert_eq!(registry.tenant_changed(&*tenancy, Some(&previous as &dyn Tenant)), 0);
    assert_eq!(db.purged().len(), 1);
}

#[tokio::test]
async fn test_new_tenant_gets_fresh_config() {
    let harness = Harness::with_tenancy(CountingTenancy::new("acme", Some("42")));
    harness.store.insert("acme", "42", "cache", "main", config(json!({"prefix": "tenant-42"})));
    harness.store.insert("acme", "43", "cache", "main", config(json!({"prefix": "tenant-43"})));

    let first = harness
        .resolver
        .resolve(ServiceKind::Cache, "main", &config(json!({"driver": "redis"})))
        .await
        .unwrap();
    assert_eq!(first.get("prefix"), Some(&json!("tenant-42")));

    harness.context.set_current_tenancy(Some(CountingTenancy::new("acme", Some("43"))));

    let second = harness
        .resolver
        .resolve(ServiceKind::Cache, "main", &config(json!({"driver": "redis"})))
        .await
        .unwrap();
    assert_eq!(second.get("prefix"), Some(&json!("tenant-43")));
}
