//! Tests for the pending transfer resolver.

use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::domain::ports::{LedgerStoreError, MockLedgerStore};
use crate::domain::{AccountId, FailureReason, ReservationHandle, TransactionStatus};
use crate::test_support::{fixture_clock, fixture_timestamp, pending_record};
use rstest::rstest;

fn resolver(store: MockLedgerStore) -> PendingTransferResolver<MockLedgerStore> {
    PendingTransferResolver::new(Arc::new(store), fixture_clock())
}

#[rstest]
#[tokio::test]
async fn grace_window_sets_the_cutoff() {
    let mut store = MockLedgerStore::new();
    store
        .expect_list_pending()
        .withf(|cutoff| *cutoff == fixture_timestamp() - chrono::Duration::seconds(30))
        .times(1)
        .return_once(|_| Ok(Vec::new()));

    let report = resolver(store)
        .resolve_pending(Duration::from_secs(30))
        .await
        .expect("pass succeeds");
    assert_eq!(report, RecoveryReport::default());
}

#[rstest]
#[tokio::test]
async fn oversized_grace_is_an_error_not_a_panic() {
    let mut store = MockLedgerStore::new();
    store.expect_list_pending().never();

    let err = resolver(store)
        .resolve_pending(Duration::from_secs(400_000 * 365 * 86_400))
        .await
        .expect_err("cutoff out of range");
    assert_eq!(err.code(), crate::domain::ErrorCode::InternalError);
}

#[rstest]
#[tokio::test]
async fn each_pending_record_reaches_a_terminal_state() {
    let payable = pending_record("alice", AccountId::random(), AccountId::random(), 100);
    let unpayable = pending_record("alice", AccountId::random(), AccountId::random(), 9_999);
    let payable_id = payable.id;
    let mut committed = payable.clone();
    committed.status = TransactionStatus::Committed;
    let mut failed = unpayable.clone();
    failed.status = TransactionStatus::Failed;
    failed.failure_reason = Some(FailureReason::InsufficientFunds);

    let mut store = MockLedgerStore::new();
    let listed = vec![payable.clone(), unpayable.clone()];
    store.expect_list_pending().return_once(move |_| Ok(listed));
    store.expect_reserve().times(2).returning(move |id| {
        if *id == payable_id {
            Ok(ReservationHandle {
                transaction_id: *id,
                account_id: payable.from_id,
                amount: payable.amount,
            })
        } else {
            Err(LedgerStoreError::insufficient_funds("available 0"))
        }
    });
    store
        .expect_commit()
        .times(1)
        .return_once(move |_, _| Ok(committed));
    store
        .expect_rollback()
        .times(1)
        .return_once(move |_, _, _| Ok(failed));

    let report = resolver(store)
        .resolve_pending(Duration::ZERO)
        .await
        .expect("pass succeeds");
    assert_eq!(
        report,
        RecoveryReport {
            committed: 1,
            failed: 1,
            skipped: 0
        }
    );
}

#[rstest]
#[tokio::test]
async fn store_errors_skip_the_record_and_continue() {
    let stuck = pending_record("alice", AccountId::random(), AccountId::random(), 100);
    let mut store = MockLedgerStore::new();
    store
        .expect_list_pending()
        .return_once(move |_| Ok(vec![stuck]));
    store
        .expect_reserve()
        .return_once(|_| Err(LedgerStoreError::connection("reset by peer")));

    let report = resolver(store)
        .resolve_pending(Duration::ZERO)
        .await
        .expect("pass succeeds");
    assert_eq!(report.skipped, 1);
}

#[rstest]
#[tokio::test]
async fn listing_failure_is_reported() {
    let mut store = MockLedgerStore::new();
    store
        .expect_list_pending()
        .return_once(|_| Err(LedgerStoreError::connection("refused")));

    let err = resolver(store)
        .resolve_pending(Duration::ZERO)
        .await
        .expect_err("listing fails");
    assert_eq!(err.code(), crate::domain::ErrorCode::ServiceUnavailable);
}
