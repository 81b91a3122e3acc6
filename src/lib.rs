//! Entitlement Engine - Entitlement reconciliation for signed purchase transactions
//!
//! This crate verifies provider-signed transactions, rebuilds the user's
//! entitlement snapshot from the provider's authoritative list, and keeps it
//! consistent across a background update listener and on-demand purchase and
//! restore flows.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod engine;
pub mod ports;
pub mod telemetry;
