//! # Error Types
//!
//! Error types for Bud config stores and override resolution using `thiserror`.

/// Custom result type for Bud operations
pub type Result<T> = std::result::Result<T, BudError>;

/// Main error type for Bud
#[derive(thiserror::Error, Debug)]
pub enum BudError {
    /// A store, the store manager or an override was configured incorrectly
    #[error(transparent)]
    Misconfiguration(#[from] Misconfiguration),

    /// No multitenancy context, or no tenancy selected within it
    #[error("There is no current tenancy")]
    TenancyMissing,

    /// The current tenancy has no authenticated tenant
    #[error("There is no current tenant for tenancy [{tenancy}]")]
    TenantMissing { tenancy: String },

    /// Tenant config points back at the bud driver
    #[error("Attempt to create cyclic bud {service} [{name}] detected")]
    CyclicOverride { service: String, name: String },

    /// The config store holds no record for the requested service and name
    #[error(
        "Unable to find {service} configuration for [{name}] for tenant [{tenant}] on tenancy [{tenancy}]"
    )]
    RecordNotFound { service: String, name: String, tenant: String, tenancy: String },

    /// Settings loading errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database and storage errors
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// Encryption failures
    #[error("Encryption error: {message}")]
    Encryption { message: String },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// The distinguishable ways a store or override can be misconfigured
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Misconfiguration {
    #[error("There is no default {factory} set")]
    NoDefault { factory: String },

    #[error("The config for [{factory}::{name}] could not be found")]
    ConfigNotFound { factory: String, name: String },

    #[error("The creator for [{factory}::{name}] could not be found")]
    CreatorNotFound { factory: String, name: String },

    #[error("The config store [{store}] is missing a required value for '{option}'")]
    MissingValue { store: String, option: String },

    #[error("The config store [{store}] has an invalid value for '{option}': {reason}")]
    InvalidValue { store: String, option: String, reason: String },

    #[error("Cannot create a {service} using bud without a name")]
    MissingName { service: String },
}

impl BudError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create an encryption error
    pub fn encryption<S: Into<String>>(message: S) -> Self {
        Self::Encryption { message: message.into() }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Create a database error with context
    pub fn database<S: Into<String>>(source: sqlx::Error, context: S) -> Self {
        Self::Database { source, context: context.into() }
    }

    /// Create an I/O error with context
    pub fn io<S: Into<String>>(source: std::io::Error, context: S) -> Self {
        Self::Io { source, context: context.into() }
    }

    /// Create a tenant missing error for the named tenancy
    pub fn tenant_missing<S: Into<String>>(tenancy: S) -> Self {
        Self::TenantMissing { tenancy: tenancy.into() }
    }

    /// Create a cyclic override error
    pub fn cyclic<S: Into<String>, N: Into<String>>(service: S, name: N) -> Self {
        Self::CyclicOverride { service: service.into(), name: name.into() }
    }

    /// Whether this error is one of the misconfiguration kinds
    pub fn is_misconfiguration(&self) -> bool {
        matches!(self, Self::Misconfiguration(_))
    }

    /// Check if this error should be retried
    ///
    /// Resolution and misconfiguration failures are terminal; only the
    /// backing medium can fail transiently.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database { .. } | Self::Io { .. })
    }
}

impl Misconfiguration {
    /// Missing required store option
    pub fn missing_value<S: Into<String>, O: Into<String>>(store: S, option: O) -> Self {
        Self::MissingValue { store: store.into(), option: option.into() }
    }

    /// Store option present but unusable
    pub fn invalid_value<S: Into<String>, O: Into<String>, R: Into<String>>(
        store: S,
        option: O,
        reason: R,
    ) -> Self {
        Self::InvalidValue { store: store.into(), option: option.into(), reason: reason.into() }
    }
}

// Error conversions for common external error types
impl From<sqlx::Error> for BudError {
    fn from(error: sqlx::Error) -> Self {
        Self::Database { source: error, context: "Database operation failed".to_string() }
    }
}

impl From<std::io::Error> for BudError {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<serde_json::Error> for BudError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}

impl From<config::ConfigError> for BudError {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("Configuration loading failed", Box::new(error))
    }
}

impl From<validator::ValidationErrors> for BudError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Validation failed: {}", message))
    }
}
