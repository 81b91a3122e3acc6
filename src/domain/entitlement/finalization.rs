//! Finalization ledger.
//!
//! Tracks which transactions this process has acknowledged to the provider.
//! Both the update listener and the purchase flow claim a transaction id here
//! before calling `finalize`, so a transaction seen on both paths is
//! acknowledged once.
//!
//! ## Race Condition Handling
//!
//! When two callers finish with the same transaction at once:
//! - First to claim wins and sends the acknowledgement
//! - Others see the id already claimed and skip
//! - A failed acknowledgement releases the claim so a redelivery can retry

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use crate::domain::foundation::TransactionId;

/// Process-local set of finalized transaction ids.
#[derive(Default)]
pub struct FinalizationLedger {
    finalized: Mutex<HashSet<TransactionId>>,
}

impl FinalizationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the right to finalize `id`. Returns false if already claimed.
    pub fn claim(&self, id: &TransactionId) -> bool {
        self.finalized
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone())
    }

    /// Gives a claim back after a failed acknowledgement.
    pub fn release(&self, id: &TransactionId) {
        self.finalized
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    pub fn is_finalized(&self, id: &TransactionId) -> bool {
        self.finalized
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    pub fn len(&self) -> usize {
        self.finalized
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn tx(id: &str) -> TransactionId {
        TransactionId::new(id).unwrap()
    }

    #[test]
    fn first_claim_wins() {
        let ledger = FinalizationLedger::new();
        assert!(ledger.claim(&tx("tx-1")));
        assert!(!ledger.claim(&tx("tx-1")));
        assert!(ledger.is_finalized(&tx("tx-1")));
    }

    #[test]
    fn release_allows_reclaim() {
        let ledger = FinalizationLedger::new();
        ledger.claim(&tx("tx-1"));

        ledger.release(&tx("tx-1"));

        assert!(!ledger.is_finalized(&tx("tx-1")));
        assert!(ledger.claim(&tx("tx-1")));
    }

    #[test]
    fn concurrent_claims_have_single_winner() {
        let ledger = Arc::new(FinalizationLedger::new());

        let winners: usize = (0..16)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || ledger.claim(&tx("tx-race")))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();

        assert_eq!(winners, 1);
        assert_eq!(ledger.len(), 1);
    }
}
