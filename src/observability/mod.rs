//! # Observability Infrastructure
//!
//! Structured logging for Bud.

pub mod logging;

pub use logging::init_logging;
