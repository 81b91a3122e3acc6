//! CheckEntitlementHandler - Query handler for "does the user own this?".

use std::sync::Arc;

use crate::domain::entitlement::{EntitlementBucket, EntitlementStore, RenewalState};
use crate::domain::foundation::ProductId;

/// Query for one product's entitlement.
#[derive(Debug, Clone)]
pub struct CheckEntitlementQuery {
    pub product_id: ProductId,
}

/// Entitlement of one product in the current snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckEntitlementResult {
    pub owned: bool,
    /// Which partition holds the product, if owned.
    pub bucket: Option<EntitlementBucket>,
    /// Renewal state when the product drives the snapshot's renewal state.
    pub renewal_state: Option<RenewalState>,
}

/// Handler for entitlement queries. Reads never block reconciliation.
pub struct CheckEntitlementHandler {
    store: Arc<EntitlementStore>,
}

impl CheckEntitlementHandler {
    pub fn new(store: Arc<EntitlementStore>) -> Self {
        Self { store }
    }

    pub fn handle(&self, query: CheckEntitlementQuery) -> CheckEntitlementResult {
        let snapshot = self.store.current();

        let bucket = if snapshot.non_consumables().iter().any(|p| p.id == query.product_id) {
            Some(EntitlementBucket::NonConsumable)
        } else if snapshot.subscriptions().iter().any(|p| p.id == query.product_id) {
            Some(EntitlementBucket::Subscription)
        } else {
            None
        };

        let renewal_state = snapshot
            .first_subscription()
            .filter(|p| p.id == query.product_id)
            .and_then(|_| snapshot.renewal_state());

        CheckEntitlementResult {
            owned: bucket.is_some(),
            bucket,
            renewal_state,
        }
    }

    /// Shorthand for `handle(..).owned`.
    pub fn is_purchased(&self, product_id: &ProductId) -> bool {
        self.store.current().owns(product_id)
    }
}
