//! Purchase provider port for the external store.
//!
//! Defines the capability set the engine consumes from the platform purchase
//! provider. Implementations own the network layer, payment UI, receipt
//! issuance and signature checking; the engine only sees signed transactions
//! with a trust decision attached.
//!
//! # Design
//!
//! - **Authoritative**: `current_entitlements` is the provider's source of
//!   truth, already filtered to active transactions
//! - **Push and pull**: `transaction_updates` pushes renewals, refunds and
//!   external purchases; callers still pull the full list to reconcile
//! - **Idempotent acknowledgement**: `finalize` may be retried safely

use std::collections::BTreeSet;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::domain::entitlement::{ProductDescriptor, ProviderError, RenewalState, SignedTransaction};
use crate::domain::foundation::{ProductId, TransactionId};

/// Port for the platform purchase provider.
///
/// Timeout and retry policy, if any, belong to the implementation.
#[async_trait]
pub trait PurchaseProvider: Send + Sync {
    /// Fetch product descriptors for the given identifiers.
    ///
    /// Unknown identifiers are omitted from the result, not reported as errors.
    async fn fetch_products(
        &self,
        ids: &BTreeSet<ProductId>,
    ) -> Result<Vec<ProductDescriptor>, ProviderError>;

    /// Stream the provider's current entitlement transactions.
    ///
    /// The stream is finite and excludes expired or refunded transactions.
    async fn current_entitlements(
        &self,
    ) -> Result<BoxStream<'static, SignedTransaction>, ProviderError>;

    /// Subscribe to transaction update notifications.
    ///
    /// The stream is infinite; it ends only when the provider goes away.
    fn transaction_updates(&self) -> BoxStream<'static, SignedTransaction>;

    /// Run the provider purchase flow for a product.
    async fn purchase(&self, product: &ProductDescriptor) -> Result<PurchaseOutcome, ProviderError>;

    /// Acknowledge delivery of a transaction so the provider stops redelivering it.
    async fn finalize(&self, transaction_id: &TransactionId) -> Result<(), ProviderError>;

    /// Force the provider to refresh purchase history from its backend.
    async fn sync(&self) -> Result<(), ProviderError>;

    /// Renewal state of a subscription product, `None` if the provider has none.
    async fn subscription_status(
        &self,
        product_id: &ProductId,
    ) -> Result<Option<RenewalState>, ProviderError>;

    /// Whether the user can still redeem the product's introductory offer.
    async fn introductory_offer_eligible(&self, product_id: &ProductId)
        -> Result<bool, ProviderError>;
}

/// Result of the provider purchase flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseOutcome {
    /// Purchase completed; the signed transaction still needs verification.
    Success(SignedTransaction),

    /// User dismissed the payment sheet.
    UserCancelled,

    /// Awaiting external approval (e.g. parental consent).
    Pending,

    /// Provider-side failure with a reason.
    Failed(String),
}
