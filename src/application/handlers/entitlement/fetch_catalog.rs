//! FetchCatalogHandler - Loads product descriptors into the catalog cache.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::EligibilityEvaluator;
use crate::domain::entitlement::{CatalogError, ProductCatalog, ProductDescriptor};
use crate::domain::foundation::ProductId;
use crate::ports::PurchaseProvider;

/// Command to fetch the product catalog.
#[derive(Debug, Clone)]
pub struct FetchCatalogCommand {
    pub product_ids: BTreeSet<ProductId>,
}

/// Result of a successful catalog fetch.
#[derive(Debug, Clone)]
pub struct FetchCatalogResult {
    pub non_consumables: Vec<ProductDescriptor>,
    pub subscriptions: Vec<ProductDescriptor>,
    /// Products dropped because their kind carries no entitlement.
    pub dropped: Vec<ProductId>,
    /// Introductory offer eligibility after the refresh.
    pub offer_eligible: bool,
}

/// Handler for catalog fetches.
///
/// A failed fetch leaves the cached catalog as it was. A successful fetch
/// replaces it and refreshes offer eligibility.
pub struct FetchCatalogHandler {
    provider: Arc<dyn PurchaseProvider>,
    catalog: Arc<ProductCatalog>,
    eligibility: Arc<EligibilityEvaluator>,
}

impl FetchCatalogHandler {
    pub fn new(
        provider: Arc<dyn PurchaseProvider>,
        catalog: Arc<ProductCatalog>,
        eligibility: Arc<EligibilityEvaluator>,
    ) -> Self {
        Self {
            provider,
            catalog,
            eligibility,
        }
    }

    pub async fn handle(&self, cmd: FetchCatalogCommand) -> Result<FetchCatalogResult, CatalogError> {
        let products = self
            .provider
            .fetch_products(&cmd.product_ids)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Catalog fetch failed");
                CatalogError::Unavailable(e)
            })?;

        let fetched = products.len();
        let partition = self.catalog.replace(products);
        if !partition.dropped.is_empty() {
            tracing::debug!(dropped = ?partition.dropped, "Dropped products without an entitlement kind");
        }
        tracing::info!(
            requested = cmd.product_ids.len(),
            fetched,
            non_consumables = partition.non_consumables,
            subscriptions = partition.subscriptions,
            "Product catalog loaded"
        );

        let offer_eligible = self.eligibility.refresh().await;

        Ok(FetchCatalogResult {
            non_consumables: self.catalog.non_consumables(),
            subscriptions: self.catalog.subscriptions(),
            dropped: partition.dropped,
            offer_eligible,
        })
    }
}
