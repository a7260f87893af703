//! # Config Stores
//!
//! Tenant-scoped, encrypted config records and the manager that constructs
//! the stores holding them.
//!
//! ## Built-in drivers
//!
//! - `database`: rows in a table of a named connection (requires `table`)
//! - `filesystem`: blobs on a named disk (requires `disk`)
//!
//! Further drivers are added with [`ConfigStoreManager::register`].

pub mod codec;
pub mod database;
pub mod filesystem;
pub mod manager;
pub mod store;

pub use codec::{ConfigCodec, ConfigMap, DecodeFailure};
pub use database::DatabaseConfigStore;
pub use filesystem::FilesystemConfigStore;
pub use manager::{ConfigStoreManager, StoreCreator, StoreEnvironment};
pub use store::ConfigStore;

use crate::storage::RecordKey;
use tracing::warn;

/// Decode a stored payload, logging why an unusable one reads as absent
pub(crate) fn decode_record(
    codec: &ConfigCodec,
    store: &str,
    key: &RecordKey,
    payload: &str,
) -> Option<ConfigMap> {
    match codec.try_decode(payload) {
        Ok(config) => Some(config),
        Err(failure) => {
            warn!(
                store = %store,
                key = %key,
                reason = failure.as_str(),
                "Ignoring config record that could not be decoded"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::AesGcmEncrypter;
    use std::sync::Arc;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_decode_failure_is_logged() {
        let key = AesGcmEncrypter::generate_key().unwrap();
        let codec = ConfigCodec::new(Arc::new(AesGcmEncrypter::from_base64(&key).unwrap()));
        let record = RecordKey::new("database", "tenant_db", "42", "acme");

        assert!(decode_record(&codec, "database", &record, "garbage").is_none());
        assert!(logs_contain("Ignoring config record that could not be decoded"));
        assert!(!logs_contain("garbage"));
    }
}
