//! Sandbox transaction signing.
//!
//! Issues and checks HMAC-SHA256 signatures for transactions minted by the
//! in-memory provider, so sandbox trust decisions come from a real check
//! rather than a hard-coded flag. Signatures are lowercase hex over the raw
//! JSON payload.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::entitlement::{ProviderError, SignedTransaction, TransactionInfo, TrustDecision};

/// Signs and checks sandbox transaction payloads.
pub struct SandboxSigner {
    /// Shared signing secret.
    secret: SecretString,
}

impl SandboxSigner {
    /// Creates a new signer with the given secret.
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Convenience constructor from a plain string.
    pub fn from_secret(secret: impl Into<String>) -> Self {
        Self::new(SecretString::new(secret.into()))
    }

    /// Computes the hex signature for a payload.
    pub fn sign(&self, payload: &str) -> String {
        hex::encode(self.compute_signature(payload))
    }

    /// Produces the trust decision for a payload/signature pair.
    ///
    /// # Verification Steps
    ///
    /// 1. Decode the hex signature
    /// 2. Compute expected signature using HMAC-SHA256
    /// 3. Compare signatures using constant-time comparison
    pub fn evaluate(&self, payload: &str, signature: &str) -> TrustDecision {
        let provided = match hex::decode(signature) {
            Ok(bytes) => bytes,
            Err(_) => {
                return TrustDecision::Untrusted {
                    reason: "signature is not valid hex".to_string(),
                }
            }
        };

        let expected = self.compute_signature(payload);
        if constant_time_compare(&expected, &provided) {
            TrustDecision::Trusted
        } else {
            TrustDecision::Untrusted {
                reason: "signature mismatch".to_string(),
            }
        }
    }

    /// Serializes, signs and evaluates a transaction in one step.
    pub fn issue(&self, info: &TransactionInfo) -> Result<SignedTransaction, ProviderError> {
        let payload = serde_json::to_string(info)
            .map_err(|e| ProviderError::internal(format!("Failed to encode transaction: {}", e)))?;
        let signature = self.sign(&payload);
        let trust = self.evaluate(&payload, &signature);
        Ok(SignedTransaction::new(payload, signature, trust))
    }

    fn compute_signature(&self, payload: &str) -> Vec<u8> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .expect("HMAC accepts any key");
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

/// Performs constant-time comparison of two byte slices.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
