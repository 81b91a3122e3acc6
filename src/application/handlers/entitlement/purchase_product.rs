//! PurchaseProductHandler - Request/response purchase flow.
//!
//! Runs the provider purchase, verifies the resulting transaction, reconciles,
//! then finalizes. Unlike the update listener, every failure is surfaced to
//! the caller, who is waiting for a definitive answer.

use std::sync::Arc;

use super::{FinalizeTransactionCommand, FinalizeTransactionHandler, ReconcileEntitlementsHandler};
use crate::domain::entitlement::{
    EntitlementSnapshot, ProductCatalog, ProductDescriptor, SignedTransaction, StoreError,
    TransactionVerifier, VerificationOutcome,
};
use crate::domain::foundation::ProductId;
use crate::ports::{PurchaseOutcome, PurchaseProvider};

/// Command to purchase a product.
#[derive(Debug, Clone)]
pub struct PurchaseProductCommand {
    pub product: ProductDescriptor,
}

/// Outcome of a purchase that did not fail.
#[derive(Debug, Clone)]
pub enum PurchaseProductResult {
    /// Verified, reconciled and finalized.
    Purchased {
        transaction: SignedTransaction,
        snapshot: Arc<EntitlementSnapshot>,
    },
    /// User dismissed the payment sheet.
    UserCancelled,
    /// Awaiting external approval; a later update will deliver it.
    Pending,
}

impl PurchaseProductResult {
    /// The delivered transaction, if the purchase completed.
    pub fn transaction(&self) -> Option<&SignedTransaction> {
        match self {
            PurchaseProductResult::Purchased { transaction, .. } => Some(transaction),
            PurchaseProductResult::UserCancelled | PurchaseProductResult::Pending => None,
        }
    }

    pub fn into_transaction(self) -> Option<SignedTransaction> {
        match self {
            PurchaseProductResult::Purchased { transaction, .. } => Some(transaction),
            PurchaseProductResult::UserCancelled | PurchaseProductResult::Pending => None,
        }
    }
}

/// Handler for purchases.
pub struct PurchaseProductHandler {
    provider: Arc<dyn PurchaseProvider>,
    verifier: TransactionVerifier,
    catalog: Arc<ProductCatalog>,
    reconciler: Arc<ReconcileEntitlementsHandler>,
    finalizer: Arc<FinalizeTransactionHandler>,
}

impl PurchaseProductHandler {
    pub fn new(
        provider: Arc<dyn PurchaseProvider>,
        verifier: TransactionVerifier,
        catalog: Arc<ProductCatalog>,
        reconciler: Arc<ReconcileEntitlementsHandler>,
        finalizer: Arc<FinalizeTransactionHandler>,
    ) -> Self {
        Self {
            provider,
            verifier,
            catalog,
            reconciler,
            finalizer,
        }
    }

    /// Purchases a product looked up in the cached catalog.
    pub async fn handle_by_id(&self, product_id: &ProductId) -> Result<PurchaseProductResult, StoreError> {
        let product = self
            .catalog
            .product(product_id)
            .ok_or_else(|| StoreError::UnknownProduct(product_id.clone()))?;
        self.handle(PurchaseProductCommand { product }).await
    }

    #[tracing::instrument(name = "purchase", skip(self, cmd), fields(product_id = %cmd.product.id))]
    pub async fn handle(&self, cmd: PurchaseProductCommand) -> Result<PurchaseProductResult, StoreError> {
        // 1. Provider purchase flow
        let outcome = self
            .provider
            .purchase(&cmd.product)
            .await
            .map_err(StoreError::Provider)?;

        let signed = match outcome {
            PurchaseOutcome::Success(signed) => signed,
            PurchaseOutcome::UserCancelled => {
                tracing::info!("Purchase cancelled by user");
                return Ok(PurchaseProductResult::UserCancelled);
            }
            PurchaseOutcome::Pending => {
                tracing::info!("Purchase pending approval");
                return Ok(PurchaseProductResult::Pending);
            }
            PurchaseOutcome::Failed(reason) => {
                tracing::warn!(reason = %reason, "Purchase failed");
                return Err(StoreError::PurchaseFailed(reason));
            }
        };

        // 2. Verify; an unverified purchase is never finalized
        let verified = match self.verifier.verify(signed) {
            VerificationOutcome::Verified(tx) => tx,
            VerificationOutcome::Unverified(reason) => {
                tracing::warn!(reason = %reason, "Purchased transaction failed verification");
                return Err(StoreError::FailedVerification(reason));
            }
        };

        // 3. Reconcile, then finalize even if reconciliation failed
        let reconciled = self.reconciler.handle().await;

        let finalized = self
            .finalizer
            .handle(FinalizeTransactionCommand {
                transaction_id: verified.transaction_id().clone(),
            })
            .await;

        let reconciled = match (reconciled, finalized) {
            (Ok(reconciled), Ok(_)) => reconciled,
            (Err(error), finalized) => {
                if let Err(finalize_error) = finalized {
                    tracing::warn!(error = %finalize_error, "Finalize after failed reconciliation also failed");
                }
                return Err(StoreError::Reconcile(error));
            }
            (Ok(_), Err(error)) => return Err(StoreError::Finalize(error)),
        };

        tracing::info!(transaction_id = %verified.transaction_id(), "Purchase completed");
        Ok(PurchaseProductResult::Purchased {
            transaction: verified.signed().clone(),
            snapshot: reconciled.snapshot,
        })
    }
}
