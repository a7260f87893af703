//! Config encryption using AES-256-GCM
//!
//! Stored tenant config is encrypted at rest. The [`Encrypter`] trait is the
//! only contract the stores rely on; [`AesGcmEncrypter`] is the built-in
//! implementation.
//!
//! Payloads are produced without any serialization envelope: the opaque
//! string is `base64(nonce || ciphertext || tag)` over the raw plaintext.
//!
//! ## Configuration
//!
//! The key is read from `encryption.key` in the settings, or the
//! `BUD__ENCRYPTION__KEY` environment variable. It must be a base64-encoded
//! 32-byte key, see [`AesGcmEncrypter::generate_key`].

use crate::config::EncryptionSettings;
use crate::errors::{BudError, Result};
use base64::Engine;
use ring::aead::{self, Aad, BoundKey, Nonce, NonceSequence, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Size of AES-256-GCM nonce in bytes
const NONCE_SIZE: usize = 12;

/// Size of AES-256-GCM tag in bytes
const TAG_SIZE: usize = 16;

/// Size of the master key in bytes
const KEY_SIZE: usize = 32;

/// Encrypts and decrypts opaque config payloads
pub trait Encrypter: Send + Sync + fmt::Debug {
    /// Encrypt plaintext into an opaque string
    fn encrypt(&self, plaintext: &[u8]) -> Result<String>;

    /// Decrypt an opaque string produced by [`Encrypter::encrypt`]
    fn decrypt(&self, payload: &str) -> Result<Vec<u8>>;
}

/// Single-use nonce sequence for AES-GCM
struct SingleNonce {
    nonce: Option<[u8; NONCE_SIZE]>,
}

impl SingleNonce {
    fn new(nonce_bytes: [u8; NONCE_SIZE]) -> Self {
        Self { nonce: Some(nonce_bytes) }
    }
}

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.nonce.take().map(Nonce::assume_unique_for_key).ok_or(ring::error::Unspecified)
    }
}

/// AES-256-GCM encrypter
#[derive(Clone)]
pub struct AesGcmEncrypter {
    key_bytes: Arc<[u8; KEY_SIZE]>,
    rng: Arc<SystemRandom>,
}

impl AesGcmEncrypter {
    /// Create an encrypter from a base64-encoded 32-byte key
    pub fn from_base64(key: &str) -> Result<Self> {
        let key_bytes = base64::engine::general_purpose::STANDARD
            .decode(key.trim())
            .map_err(|e| BudError::config(format!("Invalid base64 in encryption key: {}", e)))?;

        if key_bytes.len() != KEY_SIZE {
            return Err(BudError::config(format!(
                "Encryption key must be {} bytes (256 bits), got {} bytes",
                KEY_SIZE,
                key_bytes.len()
            )));
        }

        let mut key_array = [0u8; KEY_SIZE];
        key_array.copy_from_slice(&key_bytes);

        debug!("Config encryption initialized");

        Ok(Self { key_bytes: Arc::new(key_array), rng: Arc::new(SystemRandom::new()) })
    }

    /// Create an encrypter from settings
    pub fn from_settings(settings: &EncryptionSettings) -> Result<Self> {
        let key = settings.key.as_deref().ok_or_else(|| {
            BudError::config(
                "encryption.key is not set. Generate a key with: bud key generate",
            )
        })?;
        Self::from_base64(key)
    }

    /// Generate a fresh base64-encoded key
    pub fn generate_key() -> Result<String> {
        let mut key = [0u8; KEY_SIZE];
        SystemRandom::new()
            .fill(&mut key)
            .map_err(|_| BudError::encryption("Failed to generate random key"))?;
        Ok(base64::engine::general_purpose::STANDARD.encode(key))
    }

    fn unbound_key(&self) -> Result<UnboundKey> {
        UnboundKey::new(&AES_256_GCM, &*self.key_bytes).map_err(|_| {
            error!("Failed to create encryption key");
            BudError::encryption("Failed to create encryption key")
        })
    }
}

impl Encrypter for AesGcmEncrypter {
    #[instrument(skip(self, plaintext), fields(plaintext_len = plaintext.len()))]
    fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        self.rng.fill(&mut nonce_bytes).map_err(|_| {
            error!("Failed to generate random nonce");
            BudError::encryption("Failed to generate random nonce for encryption")
        })?;

        let mut sealing_key =
            aead::SealingKey::new(self.unbound_key()?, SingleNonce::new(nonce_bytes));

        let mut ciphertext = plaintext.to_vec();
        ciphertext.reserve(TAG_SIZE);

        sealing_key.seal_in_place_append_tag(Aad::empty(), &mut ciphertext).map_err(|_| {
            error!("Encryption failed");
            BudError::encryption("Failed to encrypt config data")
        })?;

        let mut payload = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);

        debug!(ciphertext_len = ciphertext.len(), "Encrypted config payload");

        Ok(base64::engine::general_purpose::STANDARD.encode(payload))
    }

    #[instrument(skip(self, payload), fields(payload_len = payload.len()))]
    fn decrypt(&self, payload: &str) -> Result<Vec<u8>> {
        let raw = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| BudError::encryption(format!("Payload is not valid base64: {}", e)))?;

        if raw.len() < NONCE_SIZE + TAG_SIZE {
            return Err(BudError::encryption("Payload too short (missing nonce or tag)"));
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_SIZE);
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        nonce_bytes.copy_from_slice(nonce);

        let mut opening_key =
            aead::OpeningKey::new(self.unbound_key()?, SingleNonce::new(nonce_bytes));

        let mut plaintext = ciphertext.to_vec();
        let decrypted = opening_key.open_in_place(Aad::empty(), &mut plaintext).map_err(|_| {
            debug!("Decryption failed - possible tampering or wrong key");
            BudError::encryption("Failed to decrypt config data - authentication failed")
        })?;

        Ok(decrypted.to_vec())
    }
}

impl fmt::Debug for AesGcmEncrypter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmEncrypter").field("key_bytes", &"[REDACTED]").finish()
    }
}
