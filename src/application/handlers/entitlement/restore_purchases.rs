//! RestorePurchasesHandler - Resyncs purchase history, then reconciles.

use std::sync::Arc;

use super::ReconcileEntitlementsHandler;
use crate::domain::entitlement::{EntitlementSnapshot, RestoreError};
use crate::ports::PurchaseProvider;

/// Result of a successful restore.
#[derive(Debug, Clone)]
pub struct RestorePurchasesResult {
    pub snapshot: Arc<EntitlementSnapshot>,
}

/// Handler for restoring purchases.
pub struct RestorePurchasesHandler {
    provider: Arc<dyn PurchaseProvider>,
    reconciler: Arc<ReconcileEntitlementsHandler>,
}

impl RestorePurchasesHandler {
    pub fn new(
        provider: Arc<dyn PurchaseProvider>,
        reconciler: Arc<ReconcileEntitlementsHandler>,
    ) -> Self {
        Self {
            provider,
            reconciler,
        }
    }

    pub async fn handle(&self) -> Result<RestorePurchasesResult, RestoreError> {
        // 1. Resync; on failure nothing is reconciled
        self.provider.sync().await.map_err(|e| {
            tracing::warn!(error = %e, "Purchase history sync failed");
            RestoreError::SyncFailed(e)
        })?;

        // 2. One reconciliation pass
        let reconciled = self.reconciler.handle().await.map_err(RestoreError::Reconcile)?;

        tracing::info!("Purchases restored");
        Ok(RestorePurchasesResult {
            snapshot: reconciled.snapshot,
        })
    }
}
