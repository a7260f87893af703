//! Supporting services
//!
//! Capabilities the config stores consume but do not own.

pub mod encryption;

pub use encryption::{AesGcmEncrypter, Encrypter};
