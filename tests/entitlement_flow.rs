//! Integration tests for the entitlement engine.
//!
//! These tests drive the full engine against the in-memory sandbox provider:
//! 1. Catalog fetch and offer eligibility
//! 2. Reconciliation (idempotence, full replace, verification gate, atomicity)
//! 3. Purchase and restore flows
//! 4. The background update listener and exactly-once finalization

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use entitlement_engine::adapters::provider::InMemoryPurchaseProvider;
use entitlement_engine::config::StoreConfig;
use entitlement_engine::domain::entitlement::{
    Price, ProductDescriptor, ProductKind, ProviderError, ReconcileError, RenewalState,
    RestoreError, StoreError, TransactionInfo,
};
use entitlement_engine::domain::foundation::{ProductId, TransactionId};
use entitlement_engine::engine::EntitlementEngine;
use entitlement_engine::ports::PurchaseOutcome;

// =============================================================================
// Test Infrastructure
// =============================================================================

const MONTHLY: &str = "sub.monthly";
const YEARLY: &str = "sub.yearly";
const UNLOCK: &str = "nonconsumable.unlock";
const PRO: &str = "nonconsumable.pro";

fn pid(id: &str) -> ProductId {
    ProductId::new(id).unwrap()
}

fn tid(id: &str) -> TransactionId {
    TransactionId::new(id).unwrap()
}

fn kind_of(id: &str) -> ProductKind {
    if id.starts_with("sub.") {
        ProductKind::AutoRenewable
    } else {
        ProductKind::NonConsumable
    }
}

fn info(tx: &str, id: &str) -> TransactionInfo {
    TransactionInfo::new(tid(tx), pid(id), kind_of(id))
}

fn sandbox() -> InMemoryPurchaseProvider {
    let provider = InMemoryPurchaseProvider::with_secret("integration-secret");
    for (id, price) in [(MONTHLY, 499), (YEARLY, 4999), (UNLOCK, 999), (PRO, 1999)] {
        provider.add_product(ProductDescriptor::new(pid(id), kind_of(id), id, Price::new(price, "USD")));
    }
    provider
}

fn store_config(ids: &[&str], required: &[&str]) -> StoreConfig {
    StoreConfig {
        product_ids: ids.iter().map(|s| s.to_string()).collect(),
        offer_required_products: required.iter().map(|s| s.to_string()).collect(),
    }
}

async fn started(provider: &InMemoryPurchaseProvider) -> EntitlementEngine {
    let engine = EntitlementEngine::new(
        Arc::new(provider.clone()),
        &store_config(&[MONTHLY, YEARLY, UNLOCK, PRO], &[MONTHLY, YEARLY]),
    )
    .unwrap();
    engine.start().await.unwrap();
    engine
}

fn ids_of(products: &[ProductDescriptor]) -> Vec<&str> {
    products.iter().map(|p| p.id.as_str()).collect()
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn verified_monthly_subscription_populates_subscriptions_only() {
    let provider = sandbox();
    let engine = EntitlementEngine::new(
        Arc::new(provider.clone()),
        &store_config(&[MONTHLY, YEARLY, UNLOCK], &[]),
    )
    .unwrap();
    engine.start().await.unwrap();

    provider.grant(info("tx-1", MONTHLY)).unwrap();
    provider.set_subscription_status(pid(MONTHLY), RenewalState::Subscribed);
    let snapshot = engine.reconcile().await.unwrap().snapshot;

    assert_eq!(ids_of(snapshot.subscriptions()), vec![MONTHLY]);
    assert!(snapshot.non_consumables().is_empty());
    assert_eq!(snapshot.renewal_state(), Some(RenewalState::Subscribed));
    engine.shutdown().await;
}

#[tokio::test]
async fn cancelled_purchase_changes_nothing() {
    let provider = sandbox();
    let engine = started(&provider).await;
    let before = engine.snapshot();
    provider.set_next_purchase_outcome(PurchaseOutcome::UserCancelled);

    let unlock = engine.product(&pid(UNLOCK)).unwrap();
    let result = engine.purchase(&unlock).await.unwrap();

    assert!(result.is_none());
    assert_eq!(engine.snapshot(), before);
    assert!(!provider.was_called("finalize"));
    engine.shutdown().await;
}

#[tokio::test]
async fn unverified_entry_fails_pass_and_keeps_prior_snapshot() {
    let provider = sandbox();
    let engine = started(&provider).await;
    provider.grant(info("tx-1", UNLOCK)).unwrap();
    engine.reconcile().await.unwrap();
    let before = engine.snapshot();

    provider.grant(info("tx-2", MONTHLY)).unwrap();
    let forged = provider.forge(&info("tx-3", PRO)).unwrap();
    provider.grant_signed(pid(PRO), forged);

    let err = engine.reconcile().await.unwrap_err();

    assert!(matches!(err, ReconcileError::VerificationFailed { .. }));
    assert_eq!(engine.snapshot(), before);
    assert!(!engine.is_purchased(&pid(PRO)));
    assert!(!engine.is_purchased(&pid(MONTHLY)));
    engine.shutdown().await;
}

// =============================================================================
// Reconciliation Properties
// =============================================================================

#[tokio::test]
async fn omitted_product_is_dropped_without_revocation_event() {
    let provider = sandbox();
    let engine = started(&provider).await;
    provider.grant(info("tx-1", UNLOCK)).unwrap();
    provider.grant(info("tx-2", MONTHLY)).unwrap();
    engine.reconcile().await.unwrap();
    assert!(engine.is_purchased(&pid(MONTHLY)));

    provider.revoke(&pid(MONTHLY));
    let snapshot = engine.reconcile().await.unwrap().snapshot;

    assert!(!snapshot.owns(&pid(MONTHLY)));
    assert!(snapshot.owns(&pid(UNLOCK)));
    assert_eq!(snapshot.renewal_state(), None);
    engine.shutdown().await;
}

#[tokio::test]
async fn concurrent_reconcile_triggers_all_run() {
    let provider = sandbox();
    let engine = Arc::new(started(&provider).await);
    provider.grant(info("tx-1", UNLOCK)).unwrap();
    let baseline = provider.call_count("current_entitlements");

    let tasks: Vec<_> = (0..5)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.reconcile().await })
        })
        .collect();
    let mut snapshots = Vec::new();
    for task in tasks {
        snapshots.push(task.await.unwrap().unwrap().snapshot);
    }

    assert_eq!(provider.call_count("current_entitlements"), baseline + 5);
    assert!(snapshots.windows(2).all(|w| w[0] == w[1]));
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn readers_never_observe_a_partial_snapshot() {
    let provider = sandbox();
    let engine = Arc::new(started(&provider).await);
    provider.grant(info("tx-1", UNLOCK)).unwrap();
    provider.grant(info("tx-2", MONTHLY)).unwrap();
    engine.reconcile().await.unwrap();
    let old = engine.snapshot();

    provider.revoke(&pid(UNLOCK));
    provider.revoke(&pid(MONTHLY));
    provider.grant(info("tx-3", PRO)).unwrap();
    provider.grant(info("tx-4", YEARLY)).unwrap();
    provider.set_entitlement_item_delay(Duration::from_millis(20));

    let writer = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.reconcile().await })
    };

    let is_new = |s: &entitlement_engine::domain::entitlement::EntitlementSnapshot| {
        s.owns(&pid(PRO)) && s.owns(&pid(YEARLY)) && !s.owns(&pid(UNLOCK)) && !s.owns(&pid(MONTHLY))
    };
    let mut samples = 0usize;
    while !writer.is_finished() {
        let seen = engine.snapshot();
        assert!(*seen == *old || is_new(&*seen), "torn snapshot: {:?}", seen);
        samples += 1;
        tokio::task::yield_now().await;
    }

    let new = writer.await.unwrap().unwrap().snapshot;
    assert!(is_new(&*new));
    assert!(samples > 0);
    engine.shutdown().await;
}

fn catalog_ids() -> [&'static str; 4] {
    [MONTHLY, YEARLY, UNLOCK, PRO]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn reconcile_is_idempotent_and_exact(granted in proptest::collection::vec(any::<bool>(), 4)) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let provider = sandbox();
            let engine = started(&provider).await;
            let expected: BTreeSet<&str> = catalog_ids()
                .iter()
                .zip(&granted)
                .filter(|(_, g)| **g)
                .map(|(id, _)| *id)
                .collect();
            for (i, id) in expected.iter().enumerate() {
                provider.grant(info(&format!("tx-{}", i), id)).unwrap();
            }

            let first = engine.reconcile().await.unwrap().snapshot;
            let second = engine.reconcile().await.unwrap().snapshot;
            engine.shutdown().await;

            prop_assert_eq!(&*first, &*second);
            let owned: BTreeSet<&str> = first
                .non_consumables()
                .iter()
                .chain(first.subscriptions())
                .map(|p| p.id.as_str())
                .collect();
            prop_assert_eq!(owned, expected);
            Ok(())
        })?;
    }

    #[test]
    fn forged_transactions_never_grant_or_finalize(forged in proptest::collection::vec(any::<bool>(), 4)) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let provider = sandbox();
            let engine = started(&provider).await;
            let mut forged_ids = Vec::new();
            for (i, (id, is_forged)) in catalog_ids().iter().zip(&forged).enumerate() {
                let tx = info(&format!("tx-{}", i), id);
                if *is_forged {
                    provider.grant_signed(pid(id), provider.forge(&tx).unwrap());
                    forged_ids.push(tx.transaction_id.clone());
                    provider.push_update(provider.forge(&tx).unwrap());
                } else {
                    provider.grant(tx).unwrap();
                }
            }

            let result = engine.reconcile().await;
            // Let the listener drain its queue.
            tokio::time::sleep(Duration::from_millis(20)).await;
            engine.shutdown().await;

            if forged_ids.is_empty() {
                prop_assert!(result.is_ok());
            } else {
                prop_assert!(matches!(result, Err(ReconcileError::VerificationFailed { .. })), "expected VerificationFailed, got {:?}", result);
                prop_assert!(engine.snapshot().is_empty());
            }
            for id in &forged_ids {
                prop_assert_eq!(provider.finalize_count(id), 0);
            }
            Ok(())
        })?;
    }
}

// =============================================================================
// Purchase and Restore
// =============================================================================

#[tokio::test]
async fn purchase_by_id_grants_and_finalizes_once() {
    let provider = sandbox();
    let engine = started(&provider).await;

    let result = engine.purchase_product(&pid(YEARLY)).await.unwrap();

    assert!(result.transaction().is_some());
    assert!(engine.is_purchased(&pid(YEARLY)));
    assert_eq!(engine.snapshot().renewal_state(), Some(RenewalState::Subscribed));
    assert_eq!(provider.call_count("finalize"), 1);
    engine.shutdown().await;
}

#[tokio::test]
async fn purchase_of_uncatalogued_product_fails() {
    let provider = sandbox();
    let engine = started(&provider).await;

    let err = engine.purchase_product(&pid("sub.lifetime")).await.unwrap_err();

    assert_eq!(err, StoreError::UnknownProduct(pid("sub.lifetime")));
    engine.shutdown().await;
}

#[tokio::test]
async fn restore_sync_failure_leaves_snapshot_alone() {
    let provider = sandbox();
    let engine = started(&provider).await;
    provider.grant(info("tx-1", UNLOCK)).unwrap();
    provider.set_method_error("sync", ProviderError::network("offline"));
    let reconciles_before = provider.call_count("current_entitlements");

    let err = engine.restore().await.unwrap_err();

    assert!(matches!(err, RestoreError::SyncFailed(_)));
    assert_eq!(provider.call_count("current_entitlements"), reconciles_before);
    assert!(!engine.is_purchased(&pid(UNLOCK)));

    provider.clear_errors();
    engine.restore().await.unwrap();
    assert!(engine.is_purchased(&pid(UNLOCK)));
    engine.shutdown().await;
}

// =============================================================================
// Listener and Finalization
// =============================================================================

#[tokio::test]
async fn external_purchase_arrives_through_listener() {
    let provider = sandbox();
    let engine = started(&provider).await;
    let mut changes = engine.subscribe();

    let signed = provider.grant(info("tx-ext", PRO)).unwrap();
    provider.push_update(signed);

    changes.changed().await.unwrap();
    let p = provider.clone();
    eventually(move || p.finalize_count(&tid("tx-ext")) == 1).await;
    assert!(engine.is_purchased(&pid(PRO)));
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn transaction_seen_by_listener_and_purchase_is_finalized_once() {
    let provider = sandbox();
    let engine = Arc::new(started(&provider).await);

    let signed = provider.grant(info("tx-shared", UNLOCK)).unwrap();
    provider.set_next_purchase_outcome(PurchaseOutcome::Success(signed.clone()));
    provider.push_update(signed);

    let unlock = engine.product(&pid(UNLOCK)).unwrap();
    let purchased = engine.purchase(&unlock).await.unwrap();
    assert!(purchased.is_some());

    let p = provider.clone();
    eventually(move || p.call_count("current_entitlements") >= 3).await;
    let p = provider.clone();
    eventually(move || p.finalize_count(&tid("tx-shared")) == 1).await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(provider.finalize_count(&tid("tx-shared")), 1);
    assert_eq!(engine.finalized_count(), 1);
    engine.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_listener_once() {
    let provider = sandbox();
    let engine = started(&provider).await;
    assert_eq!(provider.update_subscriber_count(), 1);

    engine.shutdown().await;
    engine.shutdown().await;

    assert_eq!(provider.update_subscriber_count(), 0);
    let signed = provider.grant(info("tx-late", UNLOCK)).unwrap();
    assert_eq!(provider.push_update(signed), 0);
    assert_eq!(provider.call_count("finalize"), 0);
}

// =============================================================================
// Eligibility
// =============================================================================

#[tokio::test]
async fn offer_eligibility_requires_every_tier() {
    let provider = sandbox();
    let engine = started(&provider).await;
    let required: BTreeSet<ProductId> = [MONTHLY, YEARLY].iter().map(|id| pid(id)).collect();
    assert!(engine.offer_eligible());
    assert!(engine.all_eligible(&required).await);

    provider.set_offer_eligible(pid(YEARLY), false);
    assert!(!engine.all_eligible(&required).await);
    assert!(engine.is_eligible(&pid(MONTHLY)).await);

    engine.fetch_catalog().await.unwrap();
    assert!(!engine.offer_eligible());
    engine.shutdown().await;
}
