//! Product descriptors and product kinds.
//!
//! Represents what the purchase provider sells and how each product is
//! bucketed into the entitlement snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::ProductId;

/// Kind of product as reported by the purchase provider.
///
/// Deserializes from the provider's snake_case kind string. Any kind this
/// engine does not know is mapped to [`ProductKind::Unknown`] instead of
/// failing, so new provider kinds are ignored rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProductKind {
    /// Used up on purchase; never part of the entitlement snapshot.
    Consumable,

    /// Bought once, owned forever.
    NonConsumable,

    /// Recurring subscription managed by the provider.
    AutoRenewable,

    /// Fixed-term subscription without automatic renewal.
    NonRenewable,

    /// Kind not recognised by this engine.
    Unknown,
}

/// The two disjoint partitions of the entitlement snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntitlementBucket {
    NonConsumable,
    Subscription,
}

impl ProductKind {
    /// Returns the snapshot partition for this kind, or `None` when the kind
    /// is deliberately not tracked as an entitlement.
    pub fn bucket(&self) -> Option<EntitlementBucket> {
        match self {
            ProductKind::NonConsumable => Some(EntitlementBucket::NonConsumable),
            ProductKind::AutoRenewable => Some(EntitlementBucket::Subscription),
            ProductKind::Consumable | ProductKind::NonRenewable | ProductKind::Unknown => None,
        }
    }

    /// Returns the provider's wire name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductKind::Consumable => "consumable",
            ProductKind::NonConsumable => "non_consumable",
            ProductKind::AutoRenewable => "auto_renewable",
            ProductKind::NonRenewable => "non_renewable",
            ProductKind::Unknown => "unknown",
        }
    }

    /// Parses a provider kind string; unrecognised values become `Unknown`.
    pub fn from_provider(value: &str) -> Self {
        match value {
            "consumable" => ProductKind::Consumable,
            "non_consumable" => ProductKind::NonConsumable,
            "auto_renewable" => ProductKind::AutoRenewable,
            "non_renewable" => ProductKind::NonRenewable,
            _ => ProductKind::Unknown,
        }
    }
}

impl From<String> for ProductKind {
    fn from(value: String) -> Self {
        ProductKind::from_provider(&value)
    }
}

impl From<ProductKind> for String {
    fn from(kind: ProductKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ProductKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Localised price of a product, in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Price {
    /// Amount in minor units (cents for USD).
    pub amount_minor: i64,

    /// ISO 4217 currency code.
    pub currency: String,
}

impl Price {
    pub fn new(amount_minor: i64, currency: impl Into<String>) -> Self {
        Self {
            amount_minor,
            currency: currency.into(),
        }
    }
}

/// A product fetched from the provider catalog.
///
/// Immutable once fetched; lives for the process session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductDescriptor {
    /// Unique product identifier.
    pub id: ProductId,

    /// Product kind.
    pub kind: ProductKind,

    /// Human-readable product name.
    pub display_name: String,

    /// Localised price.
    pub price: Price,
}

impl ProductDescriptor {
    pub fn new(
        id: ProductId,
        kind: ProductKind,
        display_name: impl Into<String>,
        price: Price,
    ) -> Self {
        Self {
            id,
            kind,
            display_name: display_name.into(),
            price,
        }
    }
}
