//! Signed transactions as delivered by the purchase provider.

use serde::{Deserialize, Serialize};

use super::ProductKind;
use crate::domain::foundation::{ProductId, TransactionId, Timestamp};

/// Trust decision the provider attached to a signed payload.
///
/// The engine never checks signatures itself; it only acts on this decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrustDecision {
    /// Signature chain validated by the provider.
    Trusted,

    /// Signature did not validate.
    Untrusted { reason: String },
}

/// Opaque signed transaction payload plus the provider's trust decision.
///
/// Ownership moves to whichever component receives it until finalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// JSON-encoded [`TransactionInfo`] covered by the signature.
    pub payload: String,

    /// Provider signature over `payload`.
    pub signature: String,

    /// Provider's verdict on `signature`.
    pub trust: TrustDecision,
}

impl SignedTransaction {
    pub fn new(payload: impl Into<String>, signature: impl Into<String>, trust: TrustDecision) -> Self {
        Self {
            payload: payload.into(),
            signature: signature.into(),
            trust,
        }
    }
}

/// Decoded fields of a signed transaction payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    /// Unique id of this transaction.
    pub transaction_id: TransactionId,

    /// Product the transaction is for.
    pub product_id: ProductId,

    /// Kind of the product at purchase time.
    pub product_kind: ProductKind,

    /// When the purchase (or renewal) happened.
    pub purchase_date: Timestamp,

    /// End of the current subscription period, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<Timestamp>,

    /// Set when the provider refunded or revoked the transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_date: Option<Timestamp>,
}

impl TransactionInfo {
    pub fn new(transaction_id: TransactionId, product_id: ProductId, product_kind: ProductKind) -> Self {
        Self {
            transaction_id,
            product_id,
            product_kind,
            purchase_date: Timestamp::now(),
            expiration_date: None,
            revocation_date: None,
        }
    }

    pub fn with_expiration(mut self, expiration: Timestamp) -> Self {
        self.expiration_date = Some(expiration);
        self
    }

    pub fn with_revocation(mut self, revoked_at: Timestamp) -> Self {
        self.revocation_date = Some(revoked_at);
        self
    }

    /// Returns true if the provider revoked this transaction.
    pub fn is_revoked(&self) -> bool {
        self.revocation_date.is_some()
    }
}
