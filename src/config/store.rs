//! Store configuration

use std::collections::BTreeSet;

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::foundation::ProductId;

/// Store configuration (product identifiers)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// Every product identifier the app sells
    pub product_ids: Vec<String>,

    /// Subscriptions that must all be offer-eligible to show the intro offer
    #[serde(default)]
    pub offer_required_products: Vec<String>,
}

impl StoreConfig {
    /// Parsed product identifiers
    pub fn product_ids(&self) -> Result<BTreeSet<ProductId>, ValidationError> {
        parse_ids(&self.product_ids)
    }

    /// Parsed offer-required product identifiers
    pub fn offer_required_products(&self) -> Result<BTreeSet<ProductId>, ValidationError> {
        parse_ids(&self.offer_required_products)
    }

    /// Validate store configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.product_ids.is_empty() {
            return Err(ValidationError::MissingRequired("STORE__PRODUCT_IDS"));
        }

        let mut seen = BTreeSet::new();
        for raw in &self.product_ids {
            let id = ProductId::new(raw.trim())
                .map_err(|_| ValidationError::InvalidProductId(raw.clone()))?;
            if !seen.insert(id) {
                return Err(ValidationError::DuplicateProduct(raw.clone()));
            }
        }

        for raw in &self.offer_required_products {
            let id = ProductId::new(raw.trim())
                .map_err(|_| ValidationError::InvalidProductId(raw.clone()))?;
            if !seen.contains(&id) {
                return Err(ValidationError::RequiredProductNotListed(raw.clone()));
            }
        }

        Ok(())
    }
}

fn parse_ids(raw: &[String]) -> Result<BTreeSet<ProductId>, ValidationError> {
    raw.iter()
        .map(|s| ProductId::new(s.trim()).map_err(|_| ValidationError::InvalidProductId(s.clone())))
        .collect()
}
