//! Entitlement error types.
//!
//! Errors surfaced by catalog fetch, reconciliation, purchase, restore and
//! finalization.
//!
//! # Propagation
//!
//! | Error | Surfaced by | Retryable |
//! |-------|-------------|-----------|
//! | CatalogError | catalog fetch | when the provider error is |
//! | ReconcileError | reconcile, purchase, restore | provider errors only |
//! | StoreError | purchase | provider errors only |
//! | RestoreError | restore | provider errors only |
//! | FinalizeError | finalization | when the provider error is |
//!
//! User cancellation and pending approval are not errors.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::UnverifiedReason;
use crate::domain::foundation::{ErrorCode, ProductId, TransactionId};

/// Category of a purchase provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorCode {
    /// Provider could not be reached.
    NetworkError,

    /// Provider reachable but refusing service.
    Unavailable,

    /// Requested resource does not exist at the provider.
    NotFound,

    /// Provider rejected the product.
    InvalidProduct,

    /// Unexpected provider-side failure.
    Internal,
}

impl ProviderErrorCode {
    /// Returns true if this category of error can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderErrorCode::NetworkError | ProviderErrorCode::Unavailable)
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderErrorCode::NetworkError => "network_error",
            ProviderErrorCode::Unavailable => "unavailable",
            ProviderErrorCode::NotFound => "not_found",
            ProviderErrorCode::InvalidProduct => "invalid_product",
            ProviderErrorCode::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

/// Error returned by a purchase provider capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct ProviderError {
    /// Error code for categorization.
    pub code: ProviderErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl ProviderError {
    /// Create a new provider error.
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: code.is_retryable(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Unavailable, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(ProviderErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn invalid_product(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidProduct, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Internal, message)
    }

    /// Maps the provider category onto an engine error code.
    pub fn error_code(&self) -> ErrorCode {
        match self.code {
            ProviderErrorCode::NetworkError => ErrorCode::NetworkError,
            ProviderErrorCode::Unavailable => ErrorCode::ProviderUnavailable,
            ProviderErrorCode::NotFound | ProviderErrorCode::InvalidProduct => ErrorCode::NotFound,
            ProviderErrorCode::Internal => ErrorCode::InternalError,
        }
    }
}

/// Catalog fetch failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Product catalog unavailable: {0}")]
    Unavailable(ProviderError),
}

impl CatalogError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::CatalogUnavailable
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::Unavailable(e) => e.retryable,
        }
    }
}

/// A reconciliation pass aborted without writing the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// One current entitlement failed verification; the whole pass is void.
    #[error("Entitlement verification failed ({transaction}): {reason}")]
    VerificationFailed {
        /// Position of the offending entry in the provider's list.
        transaction: String,
        reason: UnverifiedReason,
    },

    /// Provider failed mid-pass.
    #[error("Provider error during reconciliation: {0}")]
    Provider(ProviderError),
}

impl ReconcileError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ReconcileError::VerificationFailed { .. } => ErrorCode::VerificationFailed,
            ReconcileError::Provider(e) => e.error_code(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcileError::VerificationFailed { .. } => false,
            ReconcileError::Provider(e) => e.retryable,
        }
    }
}

/// Purchase flow failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The purchased transaction did not verify; it was not finalized.
    #[error("Purchase verification failed: {0}")]
    FailedVerification(UnverifiedReason),

    /// Provider reported the purchase as failed.
    #[error("Purchase failed: {0}")]
    PurchaseFailed(String),

    /// Product is not in the cached catalog.
    #[error("Unknown product: {0}")]
    UnknownProduct(ProductId),

    /// Provider call failed.
    #[error("Provider error during purchase: {0}")]
    Provider(ProviderError),

    /// Purchase succeeded but the follow-up reconciliation failed.
    #[error("Reconciliation after purchase failed: {0}")]
    Reconcile(ReconcileError),

    /// Purchase was delivered but could not be acknowledged.
    #[error("{0}")]
    Finalize(FinalizeError),
}

impl StoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::FailedVerification(_) => ErrorCode::VerificationFailed,
            StoreError::PurchaseFailed(_) => ErrorCode::PurchaseFailed,
            StoreError::UnknownProduct(_) => ErrorCode::UnknownProduct,
            StoreError::Provider(e) => e.error_code(),
            StoreError::Reconcile(e) => e.code(),
            StoreError::Finalize(e) => e.code(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Provider(e) => e.retryable,
            StoreError::Reconcile(e) => e.is_retryable(),
            StoreError::Finalize(e) => e.is_retryable(),
            StoreError::FailedVerification(_)
            | StoreError::PurchaseFailed(_)
            | StoreError::UnknownProduct(_) => false,
        }
    }
}

/// Restore flow failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestoreError {
    /// Provider resync failed; no reconciliation was attempted.
    #[error("Purchase history sync failed: {0}")]
    SyncFailed(ProviderError),

    /// Resync succeeded but reconciliation failed.
    #[error("Reconciliation after restore failed: {0}")]
    Reconcile(ReconcileError),
}

impl RestoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RestoreError::SyncFailed(_) => ErrorCode::SyncFailed,
            RestoreError::Reconcile(e) => e.code(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            RestoreError::SyncFailed(e) => e.retryable,
            RestoreError::Reconcile(e) => e.is_retryable(),
        }
    }
}

/// Acknowledging a transaction to the provider failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FinalizeError {
    #[error("Failed to finalize transaction {transaction_id}: {source}")]
    Provider {
        transaction_id: TransactionId,
        source: ProviderError,
    },
}

impl FinalizeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            FinalizeError::Provider { source, .. } => source.error_code(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            FinalizeError::Provider { source, .. } => source.retryable,
        }
    }
}
