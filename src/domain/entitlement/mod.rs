//! Entitlement domain - What the user owns and how that is derived.
//!
//! Contains:
//! - Products and their kinds (`product`)
//! - Signed transactions and their verification (`transaction`, `verifier`)
//! - The entitlement snapshot and its single-writer store (`snapshot`, `store`)
//! - The product catalog cache (`catalog`)
//! - Finalization bookkeeping (`finalization`)
//! - Error taxonomy (`errors`)

mod catalog;
mod errors;
mod finalization;
mod product;
mod snapshot;
mod store;
mod transaction;
mod verifier;

pub use catalog::{CatalogPartition, ProductCatalog};
pub use errors::{
    CatalogError, FinalizeError, ProviderError, ProviderErrorCode, ReconcileError, RestoreError,
    StoreError,
};
pub use finalization::FinalizationLedger;
pub use product::{EntitlementBucket, Price, ProductDescriptor, ProductKind};
pub use snapshot::{EntitlementSnapshot, RenewalState};
pub use store::EntitlementStore;
pub use transaction::{SignedTransaction, TransactionInfo, TrustDecision};
pub use verifier::{TransactionVerifier, UnverifiedReason, VerificationOutcome, VerifiedTransaction};
