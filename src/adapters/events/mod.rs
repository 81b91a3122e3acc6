//! Event adapters.
//!
//! - `TransactionUpdateListener` - Background consumer of the provider's
//!   transaction update stream

mod transaction_listener;

pub use transaction_listener::{ListenerHandle, TransactionUpdateListener, UpdateDisposition};
