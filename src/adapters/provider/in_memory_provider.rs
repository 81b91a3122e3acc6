//! In-memory purchase provider for sandbox runs and tests.
//!
//! Provides a configurable implementation of `PurchaseProvider` that keeps
//! the whole store in memory. Supports:
//! - Catalog seeding
//! - Granting, revoking and forging transactions
//! - Fan-out of transaction update notifications
//! - Scripted purchase outcomes
//! - Per-method error injection
//! - Call tracking
//!
//! # Panics
//!
//! Methods panic if the internal lock is poisoned. This adapter is a sandbox
//! and test double; production builds plug in a platform provider.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::stream::{self, BoxStream, StreamExt};

use super::SandboxSigner;
use crate::config::SandboxConfig;
use crate::domain::entitlement::{
    ProductDescriptor, ProductKind, ProviderError, RenewalState, SignedTransaction,
    TransactionInfo,
};
use crate::domain::foundation::{ProductId, TransactionId, ValidationError};
use crate::ports::{PurchaseOutcome, PurchaseProvider};

/// Recorded method call for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

/// Internal mutable state.
#[derive(Default)]
struct SandboxState {
    /// Catalog by product id.
    products: BTreeMap<ProductId, ProductDescriptor>,

    /// Current entitlements, in grant order.
    entitlements: Vec<(ProductId, SignedTransaction)>,

    /// Open transaction update subscriptions.
    update_subscribers: Vec<mpsc::UnboundedSender<SignedTransaction>>,

    /// Outcome for the next purchase, consumed on use.
    next_purchase_outcome: Option<PurchaseOutcome>,

    /// Subscription renewal states by product.
    statuses: HashMap<ProductId, RenewalState>,

    /// Introductory offer eligibility by product; absent means eligible.
    offer_eligibility: HashMap<ProductId, bool>,

    /// Specific errors by method name.
    method_errors: HashMap<String, ProviderError>,

    /// Delay before each current entitlement is yielded.
    entitlement_item_delay: Option<Duration>,

    /// Track method calls for assertions.
    call_log: Vec<MethodCall>,
}

/// In-memory purchase provider.
///
/// # Example
///
/// ```ignore
/// let provider = InMemoryPurchaseProvider::with_secret("sandbox");
/// provider.add_product(monthly.clone());
/// provider.grant(TransactionInfo::new(tx_id, monthly.id.clone(), ProductKind::AutoRenewable))?;
///
/// // Inject errors
/// provider.set_method_error("sync", ProviderError::network("offline"));
/// ```
#[derive(Clone)]
pub struct InMemoryPurchaseProvider {
    inner: Arc<Mutex<SandboxState>>,
    signer: Arc<SandboxSigner>,
}

impl InMemoryPurchaseProvider {
    /// Create a provider that signs with the given signer.
    pub fn new(signer: SandboxSigner) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SandboxState::default())),
            signer: Arc::new(signer),
        }
    }

    /// Create a provider signing with a plain-text secret.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self::new(SandboxSigner::from_secret(secret))
    }

    /// Create a provider seeded from sandbox configuration.
    pub fn from_config(config: &SandboxConfig) -> Result<Self, ValidationError> {
        let provider = Self::new(SandboxSigner::new(config.signing_secret.clone()));
        for product in &config.products {
            provider.add_product(product.to_descriptor()?);
        }
        Ok(provider)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Add a product to the catalog.
    pub fn add_product(&self, product: ProductDescriptor) {
        self.state().products.insert(product.id.clone(), product);
    }

    /// Sign a transaction without granting it.
    pub fn issue(&self, info: &TransactionInfo) -> Result<SignedTransaction, ProviderError> {
        self.signer.issue(info)
    }

    /// Sign a transaction with a foreign key so it fails the trust check.
    pub fn forge(&self, info: &TransactionInfo) -> Result<SignedTransaction, ProviderError> {
        SandboxSigner::from_secret("forged-key").issue(info).map(|forged| {
            let trust = self.signer.evaluate(&forged.payload, &forged.signature);
            SignedTransaction::new(forged.payload, forged.signature, trust)
        })
    }

    /// Sign a transaction and add it to the current entitlements.
    pub fn grant(&self, info: TransactionInfo) -> Result<SignedTransaction, ProviderError> {
        let signed = self.signer.issue(&info)?;
        self.grant_signed(info.product_id, signed.clone());
        Ok(signed)
    }

    /// Add an already-signed (possibly forged) transaction to the current entitlements.
    pub fn grant_signed(&self, product_id: ProductId, signed: SignedTransaction) {
        self.state().entitlements.push((product_id, signed));
    }

    /// Remove every current entitlement for a product (refund, expiry).
    pub fn revoke(&self, product_id: &ProductId) {
        self.state().entitlements.retain(|(id, _)| id != product_id);
    }

    /// Deliver a transaction to every open update subscription.
    ///
    /// Returns the number of subscribers that received it.
    pub fn push_update(&self, transaction: SignedTransaction) -> usize {
        let mut state = self.state();
        state
            .update_subscribers
            .retain(|tx| tx.unbounded_send(transaction.clone()).is_ok());
        state.update_subscribers.len()
    }

    /// Set the outcome of the next purchase.
    pub fn set_next_purchase_outcome(&self, outcome: PurchaseOutcome) {
        self.state().next_purchase_outcome = Some(outcome);
    }

    /// Set the renewal state reported for a subscription.
    pub fn set_subscription_status(&self, product_id: ProductId, status: RenewalState) {
        self.state().statuses.insert(product_id, status);
    }

    /// Set introductory offer eligibility for a product.
    pub fn set_offer_eligible(&self, product_id: ProductId, eligible: bool) {
        self.state().offer_eligibility.insert(product_id, eligible);
    }

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: ProviderError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    /// Clear all configured errors.
    pub fn clear_errors(&self) {
        self.state().method_errors.clear();
    }

    /// Slow down `current_entitlements` by delaying each yielded item.
    pub fn set_entitlement_item_delay(&self, delay: Duration) {
        self.state().entitlement_item_delay = Some(delay);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    /// Get all recorded method calls.
    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    /// Check if a method was called.
    pub fn was_called(&self, method: &str) -> bool {
        self.state().call_log.iter().any(|c| c.method == method)
    }

    /// Get count of calls to a method.
    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Transaction ids passed to `finalize`, in call order.
    pub fn finalized(&self) -> Vec<String> {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == "finalize")
            .filter_map(|c| c.args.first().cloned())
            .collect()
    }

    /// Number of `finalize` calls for one transaction.
    pub fn finalize_count(&self, transaction_id: &TransactionId) -> usize {
        self.finalized()
            .iter()
            .filter(|id| id.as_str() == transaction_id.as_str())
            .count()
    }

    /// Number of live update subscriptions.
    pub fn update_subscriber_count(&self) -> usize {
        let mut state = self.state();
        state.update_subscribers.retain(|tx| !tx.is_closed());
        state.update_subscribers.len()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn state(&self) -> MutexGuard<'_, SandboxState> {
        self.inner
            .lock()
            .expect("InMemoryPurchaseProvider: state lock poisoned")
    }

    fn record_call(&self, method: &str, args: Vec<String>) {
        self.state().call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
    }

    fn check_error(&self, method: &str) -> Result<(), ProviderError> {
        match self.state().method_errors.get(method) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn mint_transaction(&self, product: &ProductDescriptor) -> Result<SignedTransaction, ProviderError> {
        let transaction_id = TransactionId::new(uuid::Uuid::new_v4().to_string())
            .map_err(|e| ProviderError::internal(e.to_string()))?;
        let mut info = TransactionInfo::new(transaction_id, product.id.clone(), product.kind);
        if product.kind == ProductKind::AutoRenewable {
            let expires = info.purchase_date.add_days(30);
            info = info.with_expiration(expires);
        }
        self.signer.issue(&info)
    }
}

#[async_trait]
impl PurchaseProvider for InMemoryPurchaseProvider {
    async fn fetch_products(
        &self,
        ids: &BTreeSet<ProductId>,
    ) -> Result<Vec<ProductDescriptor>, ProviderError> {
        self.record_call(
            "fetch_products",
            ids.iter().map(|id| id.to_string()).collect(),
        );
        self.check_error("fetch_products")?;

        let state = self.state();
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn current_entitlements(
        &self,
    ) -> Result<BoxStream<'static, SignedTransaction>, ProviderError> {
        self.record_call("current_entitlements", vec![]);
        self.check_error("current_entitlements")?;

        let (items, delay) = {
            let state = self.state();
            let items: Vec<SignedTransaction> = state
                .entitlements
                .iter()
                .map(|(_, signed)| signed.clone())
                .collect();
            (items, state.entitlement_item_delay)
        };

        match delay {
            Some(delay) => Ok(stream::iter(items)
                .then(move |item| async move {
                    tokio::time::sleep(delay).await;
                    item
                })
                .boxed()),
            None => Ok(stream::iter(items).boxed()),
        }
    }

    fn transaction_updates(&self) -> BoxStream<'static, SignedTransaction> {
        self.record_call("transaction_updates", vec![]);
        let (tx, rx) = mpsc::unbounded();
        self.state().update_subscribers.push(tx);
        rx.boxed()
    }

    async fn purchase(&self, product: &ProductDescriptor) -> Result<PurchaseOutcome, ProviderError> {
        self.record_call("purchase", vec![product.id.to_string()]);
        self.check_error("purchase")?;

        let scripted = self.state().next_purchase_outcome.take();
        if let Some(outcome) = scripted {
            return Ok(outcome);
        }

        if !self.state().products.contains_key(&product.id) {
            return Err(ProviderError::invalid_product(format!(
                "{} is not sold by this store",
                product.id
            )));
        }

        let signed = self.mint_transaction(product)?;
        if product.kind.bucket().is_some() {
            let mut state = self.state();
            state.entitlements.push((product.id.clone(), signed.clone()));
            if product.kind == ProductKind::AutoRenewable {
                state
                    .statuses
                    .entry(product.id.clone())
                    .or_insert(RenewalState::Subscribed);
            }
        }

        Ok(PurchaseOutcome::Success(signed))
    }

    async fn finalize(&self, transaction_id: &TransactionId) -> Result<(), ProviderError> {
        self.record_call("finalize", vec![transaction_id.to_string()]);
        self.check_error("finalize")
    }

    async fn sync(&self) -> Result<(), ProviderError> {
        self.record_call("sync", vec![]);
        self.check_error("sync")
    }

    async fn subscription_status(
        &self,
        product_id: &ProductId,
    ) -> Result<Option<RenewalState>, ProviderError> {
        self.record_call("subscription_status", vec![product_id.to_string()]);
        self.check_error("subscription_status")?;
        Ok(self.state().statuses.get(product_id).copied())
    }

    async fn introductory_offer_eligible(
        &self,
        product_id: &ProductId,
    ) -> Result<bool, ProviderError> {
        self.record_call("introductory_offer_eligible", vec![product_id.to_string()]);
        self.check_error("introductory_offer_eligible")?;
        Ok(self
            .state()
            .offer_eligibility
            .get(product_id)
            .copied()
            .unwrap_or(true))
    }
}
