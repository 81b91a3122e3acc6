//! Purchase provider adapters.
//!
//! - `InMemoryPurchaseProvider` - Sandbox/test provider holding the whole store in memory
//! - `SandboxSigner` - HMAC-SHA256 signatures and trust decisions for sandbox transactions

mod in_memory_provider;
mod sandbox_signer;

pub use in_memory_provider::{InMemoryPurchaseProvider, MethodCall};
pub use sandbox_signer::SandboxSigner;
