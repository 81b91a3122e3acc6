//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `events` - Background consumer of provider transaction updates
//! - `provider` - Sandbox purchase provider

pub mod events;
pub mod provider;

pub use events::{ListenerHandle, TransactionUpdateListener};
pub use provider::InMemoryPurchaseProvider;
