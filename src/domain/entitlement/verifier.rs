//! Transaction verification.
//!
//! Turns a provider-delivered [`SignedTransaction`] into a decoded,
//! trusted transaction or a rejection reason. Pure: no I/O, no shared state.
//!
//! Callers must branch on the outcome. An `Unverified` transaction never
//! grants an entitlement and is never finalized.

use thiserror::Error;

use super::{ProductKind, SignedTransaction, TransactionInfo, TrustDecision};
use crate::domain::foundation::{ProductId, TransactionId};

/// Why a signed transaction was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnverifiedReason {
    /// The provider did not trust the signature.
    #[error("untrusted signature: {0}")]
    UntrustedSignature(String),

    /// The signed payload could not be decoded.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// A transaction whose signature the provider trusted and whose payload decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedTransaction {
    info: TransactionInfo,
    signed: SignedTransaction,
}

impl VerifiedTransaction {
    /// Decoded transaction fields.
    pub fn info(&self) -> &TransactionInfo {
        &self.info
    }

    /// Original signed form, as received from the provider.
    pub fn signed(&self) -> &SignedTransaction {
        &self.signed
    }

    pub fn transaction_id(&self) -> &TransactionId {
        &self.info.transaction_id
    }

    pub fn product_id(&self) -> &ProductId {
        &self.info.product_id
    }

    pub fn product_kind(&self) -> ProductKind {
        self.info.product_kind
    }
}

/// Result of verifying one signed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified(VerifiedTransaction),
    Unverified(UnverifiedReason),
}

impl VerificationOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationOutcome::Verified(_))
    }

    /// Converts into a `Result` for `?`-style branching.
    pub fn into_result(self) -> Result<VerifiedTransaction, UnverifiedReason> {
        match self {
            VerificationOutcome::Verified(tx) => Ok(tx),
            VerificationOutcome::Unverified(reason) => Err(reason),
        }
    }
}

/// Verifies signed transactions against the provider's trust decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionVerifier;

impl TransactionVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Verifies a signed transaction.
    ///
    /// # Verification Steps
    ///
    /// 1. Reject if the provider marked the signature untrusted
    /// 2. Decode the JSON payload into a [`TransactionInfo`]
    pub fn verify(&self, raw: SignedTransaction) -> VerificationOutcome {
        if let TrustDecision::Untrusted { reason } = &raw.trust {
            return VerificationOutcome::Unverified(UnverifiedReason::UntrustedSignature(
                reason.clone(),
            ));
        }

        match serde_json::from_str::<TransactionInfo>(&raw.payload) {
            Ok(info) => VerificationOutcome::Verified(VerifiedTransaction { info, signed: raw }),
            Err(e) => VerificationOutcome::Unverified(UnverifiedReason::MalformedPayload(e.to_string())),
        }
    }
}
