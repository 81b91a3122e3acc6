//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid product id: {0:?}")]
    InvalidProductId(String),

    #[error("Product listed more than once: {0}")]
    DuplicateProduct(String),

    #[error("Offer-required product {0} is not in store.product_ids")]
    RequiredProductNotListed(String),

    #[error("Sandbox signing secret must not be empty")]
    EmptySigningSecret,

    #[error("Invalid sandbox product {id}: {reason}")]
    InvalidSandboxProduct { id: String, reason: String },

    #[error("Invalid log filter directive: {0}")]
    InvalidLogLevel(String),
}
