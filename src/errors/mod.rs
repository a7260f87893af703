//! # Error Handling
//!
//! Error types shared by the config stores, the store manager and the
//! override resolution protocol.

pub mod types;

pub use types::{BudError, Misconfiguration, Result};
