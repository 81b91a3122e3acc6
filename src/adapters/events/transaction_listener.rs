//! TransactionUpdateListener - Background consumer of provider transaction updates.
//!
//! The provider pushes renewals, refunds, external and family-shared purchases
//! on an infinite stream. For each update the listener:
//!
//! 1. Verifies it; an unverified update is logged and discarded
//! 2. Runs a reconciliation pass; failures are logged, never propagated
//! 3. Finalizes the transaction once, even if reconciliation failed
//!
//! ## Shutdown
//!
//! Cancellation is cooperative. The shutdown signal is checked between
//! updates, so an update that is already being processed runs to completion.
//! Dropping the [`ListenerHandle`] also stops the task.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::application::handlers::entitlement::{
    FinalizeTransactionCommand, FinalizeTransactionHandler, ReconcileEntitlementsHandler,
};
use crate::domain::entitlement::{
    SignedTransaction, TransactionVerifier, UnverifiedReason, VerificationOutcome,
};
use crate::domain::foundation::TransactionId;
use crate::ports::PurchaseProvider;

/// What happened to one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateDisposition {
    /// Failed verification; neither reconciled nor finalized.
    Discarded(UnverifiedReason),
    /// Verified and processed.
    Delivered {
        transaction_id: TransactionId,
        reconciled: bool,
        /// False only if the provider rejected the acknowledgement.
        finalized: bool,
    },
}

/// Background service consuming the provider's transaction update stream.
pub struct TransactionUpdateListener {
    provider: Arc<dyn PurchaseProvider>,
    verifier: TransactionVerifier,
    reconciler: Arc<ReconcileEntitlementsHandler>,
    finalizer: Arc<FinalizeTransactionHandler>,
}

impl TransactionUpdateListener {
    pub fn new(
        provider: Arc<dyn PurchaseProvider>,
        verifier: TransactionVerifier,
        reconciler: Arc<ReconcileEntitlementsHandler>,
        finalizer: Arc<FinalizeTransactionHandler>,
    ) -> Self {
        Self {
            provider,
            verifier,
            reconciler,
            finalizer,
        }
    }

    /// Subscribe and spawn the listener on the current runtime.
    ///
    /// The subscription is opened before this returns, so updates pushed
    /// afterwards are never missed.
    pub fn spawn(self: Arc<Self>) -> ListenerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let updates = self.provider.transaction_updates();
        let task = tokio::spawn(async move { self.listen(updates, shutdown_rx).await });
        tracing::info!("Transaction update listener started");
        ListenerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    /// Run the listener loop until shutdown signal is received.
    ///
    /// # Arguments
    ///
    /// * `shutdown` - Watch channel that signals when to stop
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        let updates = self.provider.transaction_updates();
        self.listen(updates, shutdown).await;
    }

    async fn listen(
        &self,
        mut updates: BoxStream<'static, SignedTransaction>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Transaction update listener stopped");
                        return;
                    }
                }

                next = updates.next() => match next {
                    Some(raw) => {
                        self.process_update(raw).await;
                    }
                    None => {
                        tracing::info!("Transaction update stream ended");
                        return;
                    }
                }
            }
        }
    }

    /// Process a single update.
    ///
    /// This method is also useful for testing without running the full loop.
    pub async fn process_update(&self, raw: SignedTransaction) -> UpdateDisposition {
        let verified = match self.verifier.verify(raw) {
            VerificationOutcome::Verified(tx) => tx,
            VerificationOutcome::Unverified(reason) => {
                tracing::warn!(reason = %reason, "Discarding unverified transaction update");
                return UpdateDisposition::Discarded(reason);
            }
        };
        let transaction_id = verified.transaction_id().clone();

        let reconciled = match self.reconciler.handle().await {
            Ok(_) => true,
            Err(error) => {
                tracing::error!(
                    transaction_id = %transaction_id,
                    error = %error,
                    code = %error.code(),
                    "Reconciliation after transaction update failed"
                );
                false
            }
        };

        let finalized = match self
            .finalizer
            .handle(FinalizeTransactionCommand {
                transaction_id: transaction_id.clone(),
            })
            .await
        {
            Ok(_) => true,
            Err(error) => {
                tracing::error!(error = %error, "Failed to finalize transaction update");
                false
            }
        };

        UpdateDisposition::Delivered {
            transaction_id,
            reconciled,
            finalized,
        }
    }
}

/// Handle to a spawned listener.
///
/// `cancel` consumes the handle, so a listener is cancelled at most once.
pub struct ListenerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Signal shutdown and wait for the listener task to finish.
    pub async fn cancel(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Transaction update listener task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
