//! FinalizeTransactionHandler - Acknowledges a delivered transaction exactly once.

use std::sync::Arc;

use crate::domain::entitlement::{FinalizationLedger, FinalizeError};
use crate::domain::foundation::TransactionId;
use crate::ports::PurchaseProvider;

/// Command to acknowledge a transaction to the provider.
#[derive(Debug, Clone)]
pub struct FinalizeTransactionCommand {
    pub transaction_id: TransactionId,
}

/// Result of a finalize request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeTransactionResult {
    /// This call acknowledged the transaction.
    Finalized,
    /// Another path already acknowledged it; the provider was not called.
    AlreadyFinalized,
}

/// Handler for transaction acknowledgement.
///
/// The listener and the purchase flow share one ledger, so a transaction
/// delivered on both paths reaches the provider's `finalize` once. A failed
/// acknowledgement gives the claim back so a later delivery can retry it.
pub struct FinalizeTransactionHandler {
    provider: Arc<dyn PurchaseProvider>,
    ledger: Arc<FinalizationLedger>,
}

impl FinalizeTransactionHandler {
    pub fn new(provider: Arc<dyn PurchaseProvider>, ledger: Arc<FinalizationLedger>) -> Self {
        Self { provider, ledger }
    }

    pub async fn handle(
        &self,
        cmd: FinalizeTransactionCommand,
    ) -> Result<FinalizeTransactionResult, FinalizeError> {
        if !self.ledger.claim(&cmd.transaction_id) {
            tracing::debug!(transaction_id = %cmd.transaction_id, "Transaction already finalized");
            return Ok(FinalizeTransactionResult::AlreadyFinalized);
        }

        if let Err(source) = self.provider.finalize(&cmd.transaction_id).await {
            self.ledger.release(&cmd.transaction_id);
            return Err(FinalizeError::Provider {
                transaction_id: cmd.transaction_id,
                source,
            });
        }

        tracing::info!(transaction_id = %cmd.transaction_id, "Transaction finalized");
        Ok(FinalizeTransactionResult::Finalized)
    }

    /// The ledger shared by every finalizing path.
    pub fn ledger(&self) -> &Arc<FinalizationLedger> {
        &self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::provider::InMemoryPurchaseProvider;
    use crate::domain::entitlement::ProviderError;

    fn setup() -> (InMemoryPurchaseProvider, FinalizeTransactionHandler) {
        let provider = InMemoryPurchaseProvider::with_secret("test-secret");
        let handler = FinalizeTransactionHandler::new(
            Arc::new(provider.clone()),
            Arc::new(FinalizationLedger::new()),
        );
        (provider, handler)
    }

    fn cmd(id: &str) -> FinalizeTransactionCommand {
        FinalizeTransactionCommand {
            transaction_id: TransactionId::new(id).unwrap(),
        }
    }

    #[tokio::test]
    async fn first_call_finalizes() {
        let (provider, handler) = setup();

        let result = handler.handle(cmd("tx-1")).await.unwrap();

        assert_eq!(result, FinalizeTransactionResult::Finalized);
        assert_eq!(provider.finalized(), vec!["tx-1".to_string()]);
        assert!(handler.ledger().is_finalized(&TransactionId::new("tx-1").unwrap()));
    }

    #[tokio::test]
    async fn second_call_is_a_no_op() {
        let (provider, handler) = setup();

        handler.handle(cmd("tx-1")).await.unwrap();
        let result = handler.handle(cmd("tx-1")).await.unwrap();

        assert_eq!(result, FinalizeTransactionResult::AlreadyFinalized);
        assert_eq!(provider.call_count("finalize"), 1);
    }

    #[tokio::test]
    async fn concurrent_calls_reach_provider_once() {
        let (provider, handler) = setup();
        let handler = Arc::new(handler);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let handler = handler.clone();
                tokio::spawn(async move { handler.handle(cmd("tx-1")).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(provider.call_count("finalize"), 1);
    }

    #[tokio::test]
    async fn provider_failure_releases_claim() {
        let (provider, handler) = setup();
        provider.set_method_error("finalize", ProviderError::network("timeout"));

        let err = handler.handle(cmd("tx-1")).await.unwrap_err();
        assert!(matches!(err, FinalizeError::Provider { .. }));
        assert!(!handler.ledger().is_finalized(&TransactionId::new("tx-1").unwrap()));

        provider.clear_errors();
        let result = handler.handle(cmd("tx-1")).await.unwrap();
        assert_eq!(result, FinalizeTransactionResult::Finalized);
        assert_eq!(provider.call_count("finalize"), 2);
    }
}
