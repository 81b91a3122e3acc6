//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Provider Ports
//!
//! - `PurchaseProvider` - Catalog, entitlements, purchase flow, acknowledgement
//!   and eligibility capabilities of the platform store

mod purchase_provider;

pub use purchase_provider::{PurchaseOutcome, PurchaseProvider};

pub use crate::domain::entitlement::{ProviderError, ProviderErrorCode};
