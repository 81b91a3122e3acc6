//! ReconcileEntitlementsHandler - Rebuilds the entitlement snapshot from the provider.
//!
//! This is the only writer of the [`EntitlementStore`]. Each pass:
//!
//! 1. Streams the provider's current entitlements
//! 2. Verifies every entry; one failure voids the whole pass
//! 3. Partitions verified entries by kind and matches them against the catalog
//! 4. Reads the renewal state of the first matched subscription
//! 5. Replaces the snapshot in one step
//!
//! Passes are serialized by an async mutex held for the whole pass, so a slow
//! pass can never overwrite the result of a later one. Concurrent triggers are
//! not coalesced; each runs its own pass.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::Mutex;

use crate::domain::entitlement::{
    EntitlementBucket, EntitlementSnapshot, EntitlementStore, ProductCatalog, ReconcileError,
    RenewalState, TransactionVerifier, VerificationOutcome, VerifiedTransaction,
};
use crate::domain::foundation::ProductId;
use crate::ports::PurchaseProvider;

/// Result of a successful reconciliation pass.
#[derive(Debug, Clone)]
pub struct ReconcileEntitlementsResult {
    /// The snapshot now held by the store.
    pub snapshot: Arc<EntitlementSnapshot>,
    /// Entries that passed verification.
    pub verified: usize,
    /// Verified entries that added no product to the snapshot.
    pub skipped: usize,
}

/// Handler for entitlement reconciliation passes.
pub struct ReconcileEntitlementsHandler {
    provider: Arc<dyn PurchaseProvider>,
    verifier: TransactionVerifier,
    catalog: Arc<ProductCatalog>,
    store: Arc<EntitlementStore>,
    pass_lock: Mutex<()>,
}

impl ReconcileEntitlementsHandler {
    pub fn new(
        provider: Arc<dyn PurchaseProvider>,
        verifier: TransactionVerifier,
        catalog: Arc<ProductCatalog>,
        store: Arc<EntitlementStore>,
    ) -> Self {
        Self {
            provider,
            verifier,
            catalog,
            store,
            pass_lock: Mutex::new(()),
        }
    }

    /// Runs one full reconciliation pass.
    ///
    /// On error the previous snapshot is left untouched.
    #[tracing::instrument(name = "reconcile", skip(self))]
    pub async fn handle(&self) -> Result<ReconcileEntitlementsResult, ReconcileError> {
        let _pass = self.pass_lock.lock().await;

        // 1. Pull the authoritative list
        let mut entries = self
            .provider
            .current_entitlements()
            .await
            .map_err(ReconcileError::Provider)?;

        // 2. Verify everything before touching anything
        let mut verified = Vec::new();
        let mut position = 0usize;
        while let Some(raw) = entries.next().await {
            match self.verifier.verify(raw) {
                VerificationOutcome::Verified(tx) => verified.push(tx),
                VerificationOutcome::Unverified(reason) => {
                    tracing::warn!(position, reason = %reason, "Entitlement failed verification, aborting pass");
                    return Err(ReconcileError::VerificationFailed {
                        transaction: format!("entry {}", position),
                        reason,
                    });
                }
            }
            position += 1;
        }

        // 3. Partition and match against the catalog
        let owned = OwnedProducts::collect(&verified);
        let non_consumables: Vec<_> = self
            .catalog
            .bucket(EntitlementBucket::NonConsumable)
            .into_iter()
            .filter(|p| owned.non_consumables.contains(&p.id))
            .collect();
        let subscriptions: Vec<_> = self
            .catalog
            .bucket(EntitlementBucket::Subscription)
            .into_iter()
            .filter(|p| owned.subscriptions.contains(&p.id))
            .collect();

        let matched = non_consumables.len() + subscriptions.len();
        let unmatched = owned.len().saturating_sub(matched);
        if unmatched > 0 {
            tracing::debug!(unmatched, "Skipping entitlements for products not in the catalog");
        }

        // 4. Renewal state of the first subscription
        let renewal_state = match subscriptions.first() {
            Some(first) => Some(
                self.provider
                    .subscription_status(&first.id)
                    .await
                    .map_err(ReconcileError::Provider)?
                    .unwrap_or(RenewalState::Unknown),
            ),
            None => None,
        };

        // 5. Publish
        let snapshot = self.store.replace(EntitlementSnapshot::new(
            non_consumables,
            subscriptions,
            renewal_state,
        ));

        let skipped = verified.len() - matched;
        tracing::info!(
            verified = verified.len(),
            skipped,
            non_consumables = snapshot.non_consumables().len(),
            subscriptions = snapshot.subscriptions().len(),
            renewal_state = ?snapshot.renewal_state(),
            "Entitlements reconciled"
        );

        Ok(ReconcileEntitlementsResult {
            snapshot,
            verified: verified.len(),
            skipped,
        })
    }
}

/// Product ids owned per bucket, deduplicated.
#[derive(Default)]
struct OwnedProducts {
    non_consumables: HashSet<ProductId>,
    subscriptions: HashSet<ProductId>,
}

impl OwnedProducts {
    fn collect(verified: &[VerifiedTransaction]) -> Self {
        let mut owned = Self::default();
        for tx in verified {
            if tx.info().is_revoked() {
                tracing::debug!(transaction_id = %tx.transaction_id(), "Skipping revoked transaction");
                continue;
            }
            match tx.product_kind().bucket() {
                Some(EntitlementBucket::NonConsumable) => {
                    owned.non_consumables.insert(tx.product_id().clone());
                }
                Some(EntitlementBucket::Subscription) => {
                    owned.subscriptions.insert(tx.product_id().clone());
                }
                None => {
                    tracing::debug!(
                        transaction_id = %tx.transaction_id(),
                        kind = %tx.product_kind(),
                        "Ignoring transaction kind without an entitlement"
                    );
                }
            }
        }
        owned
    }

    fn len(&self) -> usize {
        self.non_consumables.len() + self.subscriptions.len()
    }
}
