//! In-memory product catalog cache.
//!
//! Populated from the provider once per session, then read-mostly. Products
//! are partitioned by [`EntitlementBucket`]; kinds without a bucket are
//! dropped. Each partition is kept sorted by ascending price, then id.

use std::sync::{PoisonError, RwLock};

use super::{EntitlementBucket, ProductDescriptor};
use crate::domain::foundation::ProductId;

#[derive(Default)]
struct CatalogState {
    non_consumables: Vec<ProductDescriptor>,
    subscriptions: Vec<ProductDescriptor>,
}

/// Summary of one catalog replacement.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogPartition {
    pub non_consumables: usize,
    pub subscriptions: usize,
    /// Products whose kind has no entitlement bucket.
    pub dropped: Vec<ProductId>,
}

/// Read-mostly cache of product descriptors.
#[derive(Default)]
pub struct ProductCatalog {
    state: RwLock<CatalogState>,
}

impl ProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cached catalog with freshly fetched products.
    pub fn replace(&self, products: Vec<ProductDescriptor>) -> CatalogPartition {
        let mut next = CatalogState::default();
        let mut dropped = Vec::new();

        for product in products {
            match product.kind.bucket() {
                Some(EntitlementBucket::NonConsumable) => next.non_consumables.push(product),
                Some(EntitlementBucket::Subscription) => next.subscriptions.push(product),
                None => dropped.push(product.id),
            }
        }

        sort_by_price(&mut next.non_consumables);
        sort_by_price(&mut next.subscriptions);

        let partition = CatalogPartition {
            non_consumables: next.non_consumables.len(),
            subscriptions: next.subscriptions.len(),
            dropped,
        };

        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
        partition
    }

    /// Cached non-consumable products, cheapest first.
    pub fn non_consumables(&self) -> Vec<ProductDescriptor> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .non_consumables
            .clone()
    }

    /// Cached subscription products, cheapest first.
    pub fn subscriptions(&self) -> Vec<ProductDescriptor> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .subscriptions
            .clone()
    }

    /// Looks up a product in either partition.
    pub fn product(&self, id: &ProductId) -> Option<ProductDescriptor> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .non_consumables
            .iter()
            .chain(state.subscriptions.iter())
            .find(|p| &p.id == id)
            .cloned()
    }

    /// Returns one partition as a single consistent read.
    pub fn bucket(&self, bucket: EntitlementBucket) -> Vec<ProductDescriptor> {
        match bucket {
            EntitlementBucket::NonConsumable => self.non_consumables(),
            EntitlementBucket::Subscription => self.subscriptions(),
        }
    }

    pub fn is_empty(&self) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.non_consumables.is_empty() && state.subscriptions.is_empty()
    }
}

fn sort_by_price(products: &mut [ProductDescriptor]) {
    products.sort_by(|a, b| {
        a.price
            .amount_minor
            .cmp(&b.price.amount_minor)
            .then_with(|| a.id.cmp(&b.id))
    });
}
