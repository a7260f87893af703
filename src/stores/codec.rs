//! Config record codec
//!
//! Turns a config map into the opaque encrypted string persisted by stores,
//! and back. Decoding is deliberately lenient: anything that does not decrypt
//! to a JSON object is reported as "no record".

use crate::errors::Result;
use crate::services::Encrypter;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// A flat, string-keyed config mapping
pub type ConfigMap = Map<String, Value>;

/// Why a payload was treated as absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFailure {
    /// The encrypter rejected the payload
    Decrypt,
    /// The plaintext was not valid JSON
    Json,
    /// The plaintext was JSON but not an object
    NotAnObject,
}

impl DecodeFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decrypt => "decrypt",
            Self::Json => "json",
            Self::NotAnObject => "not_an_object",
        }
    }
}

/// Encrypting JSON codec for config records
#[derive(Debug, Clone)]
pub struct ConfigCodec {
    encrypter: Arc<dyn Encrypter>,
}

impl ConfigCodec {
    pub fn new(encrypter: Arc<dyn Encrypter>) -> Self {
        Self { encrypter }
    }

    /// JSON-encode then encrypt a config map
    ///
    /// Keys are emitted in sorted order, so equal maps encode to equal
    /// plaintexts.
    pub fn encode(&self, config: &ConfigMap) -> Result<String> {
        let encoded = serde_json::to_vec(config)?;
        self.encrypter.encrypt(&encoded)
    }

    /// Decrypt then JSON-decode a payload, `None` on any failure
    pub fn decode(&self, payload: &str) -> Option<ConfigMap> {
        self.try_decode(payload).ok()
    }

    /// Decode a payload, reporting why it could not be used
    pub fn try_decode(&self, payload: &str) -> std::result::Result<ConfigMap, DecodeFailure> {
        let plaintext = self.encrypter.decrypt(payload).map_err(|e| {
            debug!(error = %e, "Config payload failed to decrypt");
            DecodeFailure::Decrypt
        })?;

        match serde_json::from_slice::<Value>(&plaintext) {
            Ok(Value::Object(config)) => Ok(config),
            Ok(_) => Err(DecodeFailure::NotAnObject),
            Err(_) => Err(DecodeFailure::Json),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::AesGcmEncrypter;
    use proptest::prelude::*;
    use serde_json::json;

    fn codec() -> ConfigCodec {
        let key = AesGcmEncrypter::generate_key().unwrap();
        ConfigCodec::new(Arc::new(AesGcmEncrypter::from_base64(&key).unwrap()))
    }

    fn object(value: Value) -> ConfigMap {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_roundtrip_nested_values() {
        let codec = codec();
        let config = object(json!({
            "driver": "mysql",
            "port": 3306,
            "options": {"ssl": true, "ciphers": ["a", "b"]},
            "password": null
        }));

        let payload = codec.encode(&config).unwrap();
        assert_eq!(codec.decode(&payload), Some(config));
    }

    #[test]
    fn test_floats_keep_every_bit() {
        let codec = codec();
        let config = object(json!({
            "tiny": 1.0715660391465826e-75,
            "negative": -1.81996730402717e-179,
            "large": -1.603964615428183e143,
            "ratio": 0.1
        }));

        let payload = codec.encode(&config).unwrap();
        assert_eq!(codec.decode(&payload), Some(config));
    }

    #[test]
    fn test_non_object_json_is_absent() {
        let codec = codec();
        let payload = codec.encrypter.encrypt(b"[1, 2, 3]").unwrap();

        assert_eq!(codec.try_decode(&payload), Err(DecodeFailure::NotAnObject));
        assert_eq!(codec.decode(&payload), None);
    }

    #[test]
    fn test_invalid_json_is_absent() {
        let codec = codec();
        let payload = codec.encrypter.encrypt(b"{not json").unwrap();

        assert_eq!(codec.try_decode(&payload), Err(DecodeFailure::Json));
    }

    #[test]
    fn test_foreign_payload_is_absent() {
        let payload = codec().encode(&object(json!({"driver": "array"}))).unwrap();

        assert_eq!(codec().try_decode(&payload), Err(DecodeFailure::Decrypt));
        assert_eq!(codec().decode("garbage"), None);
    }

    fn json_leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            any::<f64>().prop_filter("finite", |f| f.is_finite()).prop_map(Value::from),
            "[a-zA-Z0-9 ._-]{0,16}".prop_map(Value::String),
        ]
    }

    fn json_value() -> impl Strategy<Value = Value> {
        json_leaf().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,8}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(
            entries in prop::collection::btree_map("[a-zA-Z_]{1,12}", json_value(), 0..8)
        ) {
            let codec = codec();
            let config: ConfigMap = entries.into_iter().collect();

            let payload = codec.encode(&config).unwrap();
            prop_assert_eq!(codec.decode(&payload), Some(config));
        }
    }
}
