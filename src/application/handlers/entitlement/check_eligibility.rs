//! EligibilityEvaluator - Introductory offer eligibility.
//!
//! Per-product checks delegate to the provider. The aggregate is the logical
//! AND over a configured set of required products and gates display of the
//! introductory offer. A provider error counts as not eligible.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::watch;

use crate::domain::foundation::ProductId;
use crate::ports::PurchaseProvider;

/// Evaluates and publishes introductory offer eligibility.
pub struct EligibilityEvaluator {
    provider: Arc<dyn PurchaseProvider>,
    required: BTreeSet<ProductId>,
    state: watch::Sender<bool>,
}

impl EligibilityEvaluator {
    /// Creates an evaluator for the given required product set.
    ///
    /// The published state starts as not eligible until the first refresh.
    pub fn new(provider: Arc<dyn PurchaseProvider>, required: BTreeSet<ProductId>) -> Self {
        let (state, _) = watch::channel(false);
        Self {
            provider,
            required,
            state,
        }
    }

    /// Whether the user can still redeem this product's introductory offer.
    pub async fn is_eligible(&self, product_id: &ProductId) -> bool {
        match self.provider.introductory_offer_eligible(product_id).await {
            Ok(eligible) => eligible,
            Err(error) => {
                tracing::warn!(product_id = %product_id, error = %error, "Eligibility check failed, treating as not eligible");
                false
            }
        }
    }

    /// True only if every listed product is eligible.
    ///
    /// Each product is checked once, even after one reports not eligible.
    pub async fn all_eligible(&self, products: &BTreeSet<ProductId>) -> bool {
        let mut all = true;
        for product_id in products {
            all &= self.is_eligible(product_id).await;
        }
        all
    }

    /// Recomputes eligibility over the required set and publishes it.
    pub async fn refresh(&self) -> bool {
        let eligible = self.all_eligible(&self.required).await;
        self.state.send_replace(eligible);
        tracing::debug!(eligible, required = self.required.len(), "Offer eligibility refreshed");
        eligible
    }

    /// Last published eligibility.
    pub fn current(&self) -> bool {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    pub fn required(&self) -> &BTreeSet<ProductId> {
        &self.required
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::provider::InMemoryPurchaseProvider;
    use crate::domain::entitlement::ProviderError;
    use proptest::prelude::*;

    fn pid(id: &str) -> ProductId {
        ProductId::new(id).unwrap()
    }

    fn required() -> BTreeSet<ProductId> {
        ["sub.monthly", "sub.quarterly", "sub.yearly"]
            .iter()
            .map(|id| pid(id))
            .collect()
    }

    fn setup() -> (InMemoryPurchaseProvider, EligibilityEvaluator) {
        let provider = InMemoryPurchaseProvider::with_secret("test-secret");
        let evaluator = EligibilityEvaluator::new(Arc::new(provider.clone()), required());
        (provider, evaluator)
    }

    #[tokio::test]
    async fn all_required_eligible_is_true() {
        let (_, evaluator) = setup();
        assert!(evaluator.all_eligible(&required()).await);
    }

    #[tokio::test]
    async fn one_ineligible_flips_aggregate() {
        let (provider, evaluator) = setup();
        provider.set_offer_eligible(pid("sub.quarterly"), false);

        assert!(!evaluator.all_eligible(&required()).await);
        assert_eq!(provider.call_count("introductory_offer_eligible"), 3);
    }

    #[tokio::test]
    async fn provider_error_counts_as_ineligible() {
        let (provider, evaluator) = setup();
        provider.set_method_error("introductory_offer_eligible", ProviderError::network("offline"));

        assert!(!evaluator.is_eligible(&pid("sub.monthly")).await);
    }

    #[tokio::test]
    async fn refresh_publishes_state() {
        let (provider, evaluator) = setup();
        let mut rx = evaluator.subscribe();
        assert!(!evaluator.current());

        assert!(evaluator.refresh().await);
        assert!(evaluator.current());
        assert!(*rx.borrow_and_update());

        provider.set_offer_eligible(pid("sub.yearly"), false);
        assert!(!evaluator.refresh().await);
        rx.changed().await.unwrap();
        assert!(!*rx.borrow());
    }

    #[tokio::test]
    async fn empty_required_set_is_eligible() {
        let provider = InMemoryPurchaseProvider::with_secret("test-secret");
        let evaluator = EligibilityEvaluator::new(Arc::new(provider.clone()), BTreeSet::new());

        assert!(evaluator.refresh().await);
        assert!(!provider.was_called("introductory_offer_eligible"));
    }

    proptest! {
        #[test]
        fn aggregate_is_and_of_individual_flags(flags in proptest::collection::vec(any::<bool>(), 1..6)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let provider = InMemoryPurchaseProvider::with_secret("test-secret");
            let products: BTreeSet<ProductId> = flags
                .iter()
                .enumerate()
                .map(|(i, eligible)| {
                    let id = pid(&format!("sub.tier{}", i));
                    provider.set_offer_eligible(id.clone(), *eligible);
                    id
                })
                .collect();
            let evaluator = EligibilityEvaluator::new(Arc::new(provider), products.clone());

            let aggregate = rt.block_on(evaluator.all_eligible(&products));

            prop_assert_eq!(aggregate, flags.iter().all(|f| *f));
        }
    }
}
