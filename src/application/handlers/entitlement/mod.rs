//! Entitlement handlers.
//!
//! Command and query handlers for the entitlement lifecycle:
//!
//! ## Commands
//! - Fetching the product catalog
//! - Reconciling entitlements (sole writer of the snapshot)
//! - Purchasing a product
//! - Restoring purchases
//! - Finalizing delivered transactions
//!
//! ## Queries
//! - Checking a product's entitlement
//! - Introductory offer eligibility

mod check_eligibility;
mod check_entitlement;
mod fetch_catalog;
mod finalize_transaction;
mod purchase_product;
mod reconcile_entitlements;
mod restore_purchases;

// Commands
pub use fetch_catalog::{FetchCatalogCommand, FetchCatalogHandler, FetchCatalogResult};
pub use finalize_transaction::{
    FinalizeTransactionCommand, FinalizeTransactionHandler, FinalizeTransactionResult,
};
pub use purchase_product::{PurchaseProductCommand, PurchaseProductHandler, PurchaseProductResult};
pub use reconcile_entitlements::{ReconcileEntitlementsHandler, ReconcileEntitlementsResult};
pub use restore_purchases::{RestorePurchasesHandler, RestorePurchasesResult};

// Queries
pub use check_eligibility::EligibilityEvaluator;
pub use check_entitlement::{CheckEntitlementHandler, CheckEntitlementQuery, CheckEntitlementResult};
