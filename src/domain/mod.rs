//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (identifiers, timestamps, errors)
//! - `entitlement` - Products, signed transactions, verification and the entitlement snapshot

pub mod entitlement;
pub mod foundation;
