//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Command handlers (catalog fetch, reconcile, purchase, restore, finalize)
//! are separated from queries (entitlement checks, offer eligibility).

pub mod handlers;
