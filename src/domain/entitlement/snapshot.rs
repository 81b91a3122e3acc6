//! Entitlement snapshot value object.
//!
//! A snapshot is always built whole and replaced whole. There is no API for
//! patching one in place.

use serde::{Deserialize, Serialize};

use super::ProductDescriptor;
use crate::domain::foundation::ProductId;

/// Renewal state of the tracked subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalState {
    /// Subscription is active and will renew.
    Subscribed,

    /// Subscription period ended.
    Expired,

    /// Renewal failed; provider is retrying billing.
    InBillingRetryPeriod,

    /// Renewal failed but access continues during grace.
    InGracePeriod,

    /// Provider revoked the subscription.
    Revoked,

    /// Status not recognised by this engine.
    Unknown,
}

impl RenewalState {
    /// Check if this renewal state still grants access.
    pub fn grants_access(&self) -> bool {
        matches!(self, RenewalState::Subscribed | RenewalState::InGracePeriod)
    }
}

/// What the user currently owns.
///
/// The two partitions are disjoint and keep catalog order. `renewal_state`
/// reflects the first active subscription only, or `None` when there is no
/// active subscription.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntitlementSnapshot {
    non_consumables: Vec<ProductDescriptor>,
    subscriptions: Vec<ProductDescriptor>,
    renewal_state: Option<RenewalState>,
}

impl EntitlementSnapshot {
    /// Creates an empty snapshot (nothing owned).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a snapshot from already-partitioned products.
    pub fn new(
        non_consumables: Vec<ProductDescriptor>,
        subscriptions: Vec<ProductDescriptor>,
        renewal_state: Option<RenewalState>,
    ) -> Self {
        Self {
            non_consumables,
            subscriptions,
            renewal_state,
        }
    }

    /// Owned non-consumable products.
    pub fn non_consumables(&self) -> &[ProductDescriptor] {
        &self.non_consumables
    }

    /// Active subscriptions.
    pub fn subscriptions(&self) -> &[ProductDescriptor] {
        &self.subscriptions
    }

    /// Renewal state of the first active subscription.
    pub fn renewal_state(&self) -> Option<RenewalState> {
        self.renewal_state
    }

    /// The subscription whose status drives `renewal_state`.
    pub fn first_subscription(&self) -> Option<&ProductDescriptor> {
        self.subscriptions.first()
    }

    /// Returns true if the product is owned or actively subscribed.
    pub fn owns(&self, product_id: &ProductId) -> bool {
        self.non_consumables
            .iter()
            .chain(self.subscriptions.iter())
            .any(|p| &p.id == product_id)
    }

    pub fn is_empty(&self) -> bool {
        self.non_consumables.is_empty() && self.subscriptions.is_empty()
    }
}
