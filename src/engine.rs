//! EntitlementEngine - Wires the entitlement handlers around one provider.
//!
//! Owns the shared catalog, snapshot store and finalization ledger, and the
//! lifetime of the transaction update listener.
//!
//! # Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use entitlement_engine::adapters::provider::InMemoryPurchaseProvider;
//! # use entitlement_engine::config::StoreConfig;
//! # use entitlement_engine::engine::EntitlementEngine;
//! # async fn demo(store: StoreConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let provider = Arc::new(InMemoryPurchaseProvider::with_secret("sandbox"));
//! let engine = EntitlementEngine::new(provider, &store)?;
//!
//! engine.start().await?;
//! let owned = engine.snapshot();
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::adapters::events::{ListenerHandle, TransactionUpdateListener};
use crate::application::handlers::entitlement::{
    CheckEntitlementHandler, CheckEntitlementQuery, CheckEntitlementResult, EligibilityEvaluator,
    FetchCatalogCommand, FetchCatalogHandler, FetchCatalogResult, FinalizeTransactionHandler,
    PurchaseProductCommand, PurchaseProductHandler, PurchaseProductResult,
    ReconcileEntitlementsHandler, ReconcileEntitlementsResult, RestorePurchasesHandler,
    RestorePurchasesResult,
};
use crate::config::{StoreConfig, ValidationError};
use crate::domain::entitlement::{
    CatalogError, EntitlementSnapshot, EntitlementStore, FinalizationLedger, ProductCatalog,
    ProductDescriptor, ReconcileError, RestoreError, SignedTransaction, StoreError,
    TransactionVerifier,
};
use crate::domain::foundation::ProductId;
use crate::ports::PurchaseProvider;

/// Composition root for the entitlement core.
pub struct EntitlementEngine {
    product_ids: BTreeSet<ProductId>,
    catalog: Arc<ProductCatalog>,
    store: Arc<EntitlementStore>,
    ledger: Arc<FinalizationLedger>,
    eligibility: Arc<EligibilityEvaluator>,
    fetch_catalog: FetchCatalogHandler,
    reconciler: Arc<ReconcileEntitlementsHandler>,
    purchase: PurchaseProductHandler,
    restore: RestorePurchasesHandler,
    check: CheckEntitlementHandler,
    listener: Arc<TransactionUpdateListener>,
    listener_handle: Mutex<Option<ListenerHandle>>,
}

impl EntitlementEngine {
    /// Build an engine for the configured products.
    pub fn new(
        provider: Arc<dyn PurchaseProvider>,
        config: &StoreConfig,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        let product_ids = config.product_ids()?;
        let required = config.offer_required_products()?;

        let verifier = TransactionVerifier::new();
        let catalog = Arc::new(ProductCatalog::new());
        let store = Arc::new(EntitlementStore::new());
        let ledger = Arc::new(FinalizationLedger::new());

        let eligibility = Arc::new(EligibilityEvaluator::new(provider.clone(), required));
        let reconciler = Arc::new(ReconcileEntitlementsHandler::new(
            provider.clone(),
            verifier,
            catalog.clone(),
            store.clone(),
        ));
        let finalizer = Arc::new(FinalizeTransactionHandler::new(provider.clone(), ledger.clone()));

        Ok(Self {
            fetch_catalog: FetchCatalogHandler::new(
                provider.clone(),
                catalog.clone(),
                eligibility.clone(),
            ),
            purchase: PurchaseProductHandler::new(
                provider.clone(),
                verifier,
                catalog.clone(),
                reconciler.clone(),
                finalizer.clone(),
            ),
            restore: RestorePurchasesHandler::new(provider.clone(), reconciler.clone()),
            check: CheckEntitlementHandler::new(store.clone()),
            listener: Arc::new(TransactionUpdateListener::new(
                provider,
                verifier,
                reconciler.clone(),
                finalizer,
            )),
            listener_handle: Mutex::new(None),
            product_ids,
            catalog,
            store,
            ledger,
            eligibility,
            reconciler,
        })
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Lifecycle
    // ════════════════════════════════════════════════════════════════════════════

    /// Start the session.
    ///
    /// 1. Spawns the transaction update listener (once)
    /// 2. Fetches the catalog, which refreshes offer eligibility
    /// 3. Runs an initial reconciliation; a failure here is only logged
    ///
    /// A catalog failure is returned, but the listener keeps running.
    pub async fn start(&self) -> Result<FetchCatalogResult, CatalogError> {
        {
            let mut handle = self.listener_handle.lock().await;
            if handle.is_none() {
                *handle = Some(self.listener.clone().spawn());
            }
        }

        let catalog = self.fetch_catalog().await?;

        if let Err(error) = self.reconcile().await {
            tracing::warn!(error = %error, "Initial reconciliation failed");
        }

        Ok(catalog)
    }

    /// Cancel the update listener and wait for it to stop.
    ///
    /// Only the first call cancels; later calls return immediately.
    pub async fn shutdown(&self) {
        let handle = self.listener_handle.lock().await.take();
        if let Some(handle) = handle {
            handle.cancel().await;
        }
    }

    /// Whether the update listener is running.
    pub async fn is_listening(&self) -> bool {
        self.listener_handle
            .lock()
            .await
            .as_ref()
            .map_or(false, |h| !h.is_finished())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Commands
    // ════════════════════════════════════════════════════════════════════════════

    /// Fetch the configured products into the catalog cache.
    pub async fn fetch_catalog(&self) -> Result<FetchCatalogResult, CatalogError> {
        self.fetch_catalog
            .handle(FetchCatalogCommand {
                product_ids: self.product_ids.clone(),
            })
            .await
    }

    /// Run one reconciliation pass.
    pub async fn reconcile(&self) -> Result<ReconcileEntitlementsResult, ReconcileError> {
        self.reconciler.handle().await
    }

    /// Purchase a product. Cancelled and pending purchases return `None`.
    pub async fn purchase(
        &self,
        product: &ProductDescriptor,
    ) -> Result<Option<SignedTransaction>, StoreError> {
        self.purchase
            .handle(PurchaseProductCommand {
                product: product.clone(),
            })
            .await
            .map(PurchaseProductResult::into_transaction)
    }

    /// Purchase a product from the cached catalog by id.
    pub async fn purchase_product(
        &self,
        product_id: &ProductId,
    ) -> Result<PurchaseProductResult, StoreError> {
        self.purchase.handle_by_id(product_id).await
    }

    /// Resync purchase history and reconcile.
    pub async fn restore(&self) -> Result<RestorePurchasesResult, RestoreError> {
        self.restore.handle().await
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Queries
    // ════════════════════════════════════════════════════════════════════════════

    /// Current entitlement snapshot.
    pub fn snapshot(&self) -> Arc<EntitlementSnapshot> {
        self.store.current()
    }

    /// Subscribe to snapshot replacements.
    pub fn subscribe(&self) -> watch::Receiver<Arc<EntitlementSnapshot>> {
        self.store.subscribe()
    }

    pub fn is_purchased(&self, product_id: &ProductId) -> bool {
        self.check.is_purchased(product_id)
    }

    pub fn check_entitlement(&self, product_id: &ProductId) -> CheckEntitlementResult {
        self.check.handle(CheckEntitlementQuery {
            product_id: product_id.clone(),
        })
    }

    pub fn non_consumables(&self) -> Vec<ProductDescriptor> {
        self.catalog.non_consumables()
    }

    pub fn subscriptions(&self) -> Vec<ProductDescriptor> {
        self.catalog.subscriptions()
    }

    pub fn product(&self, product_id: &ProductId) -> Option<ProductDescriptor> {
        self.catalog.product(product_id)
    }

    pub async fn is_eligible(&self, product_id: &ProductId) -> bool {
        self.eligibility.is_eligible(product_id).await
    }

    pub async fn all_eligible(&self, products: &BTreeSet<ProductId>) -> bool {
        self.eligibility.all_eligible(products).await
    }

    /// Eligibility over the configured required set, as of the last catalog fetch.
    pub fn offer_eligible(&self) -> bool {
        self.eligibility.current()
    }

    pub fn subscribe_offer_eligibility(&self) -> watch::Receiver<bool> {
        self.eligibility.subscribe()
    }

    /// Number of transactions this session has acknowledged.
    pub fn finalized_count(&self) -> usize {
        self.ledger.len()
    }
}
