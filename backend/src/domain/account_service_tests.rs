//! Tests for account creation and owner-scoped reads.

use std::sync::Arc;

use super::*;
use crate::domain::ports::{LedgerStoreError, MockLedgerStore};
use crate::domain::{Amount, EntryKind, ErrorCode};
use crate::test_support::{account, admin, customer, fixture_clock, fixture_timestamp, usd};
use rstest::rstest;

fn service(store: MockLedgerStore) -> AccountService<MockLedgerStore> {
    AccountService::new(Arc::new(store), AccessPolicy::default(), fixture_clock())
}

fn request(opening_balance: Option<i64>) -> CreateAccountRequest {
    CreateAccountRequest {
        currency: usd(),
        opening_balance: opening_balance.map(Amount::new),
    }
}

#[rstest]
#[tokio::test]
async fn create_account_without_funding_writes_no_entry() {
    let mut store = MockLedgerStore::new();
    store
        .expect_insert_account()
        .withf(|opened| opened.opening_entry.is_none() && opened.account.balance == Amount::ZERO)
        .times(1)
        .return_once(|_| Ok(()));

    let created = service(store)
        .create_account(&customer("alice"), request(None))
        .await
        .expect("account created");

    assert_eq!(created.owner.as_ref(), "alice");
    assert_eq!(created.created_at, fixture_timestamp());
}

#[rstest]
#[tokio::test]
async fn elevated_principal_funds_account_with_opening_entry() {
    let mut store = MockLedgerStore::new();
    store
        .expect_insert_account()
        .withf(|opened| {
            opened.opening_entry.as_ref().is_some_and(|entry| {
                entry.kind == EntryKind::Opening
                    && entry.delta == Amount::new(1_000)
                    && entry.account_id == opened.account.id
            })
        })
        .times(1)
        .return_once(|_| Ok(()));

    let created = service(store)
        .create_account(&admin(), request(Some(1_000)))
        .await
        .expect("account created");

    assert_eq!(created.balance, Amount::new(1_000));
}

#[rstest]
#[tokio::test]
async fn customer_cannot_self_fund() {
    let mut store = MockLedgerStore::new();
    store.expect_insert_account().never();

    let err = service(store)
        .create_account(&customer("alice"), request(Some(50)))
        .await
        .expect_err("self funding is forbidden");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[rstest]
#[tokio::test]
async fn negative_opening_balance_is_invalid() {
    let mut store = MockLedgerStore::new();
    store.expect_insert_account().never();

    let err = service(store)
        .create_account(&admin(), request(Some(-1)))
        .await
        .expect_err("negative funding rejected");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn store_outage_maps_to_service_unavailable() {
    let mut store = MockLedgerStore::new();
    store
        .expect_insert_account()
        .return_once(|_| Err(LedgerStoreError::connection("refused")));

    let err = service(store)
        .create_account(&customer("alice"), request(None))
        .await
        .expect_err("outage propagates");
    assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
}

#[rstest]
#[tokio::test]
async fn owner_reads_balance_with_available_funds() {
    let mut stored = account("alice", 1_000);
    stored.reserved = Amount::new(250);
    let id = stored.id;
    let mut store = MockLedgerStore::new();
    store
        .expect_find_account()
        .return_once(move |_| Ok(Some(stored)));

    let view = service(store)
        .get_balance(&customer("alice"), &id)
        .await
        .expect("balance readable");
    assert_eq!(view.balance, Amount::new(1_000));
    assert_eq!(view.available, Amount::new(750));
}

#[rstest]
#[tokio::test]
async fn stranger_is_forbidden_from_reading() {
    let stored = account("alice", 10);
    let id = stored.id;
    let mut store = MockLedgerStore::new();
    store
        .expect_find_account()
        .return_once(move |_| Ok(Some(stored)));
    store.expect_list_entries().never();

    let err = service(store)
        .list_entries(&customer("mallory"), &id)
        .await
        .expect_err("stranger rejected");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[rstest]
#[tokio::test]
async fn unknown_account_is_not_found() {
    let mut store = MockLedgerStore::new();
    store.expect_find_account().return_once(|_| Ok(None));

    let err = service(store)
        .get_account(&admin(), &crate::domain::AccountId::random())
        .await
        .expect_err("unknown account");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn admin_lists_entries_of_any_account() {
    let stored = account("alice", 1_000);
    let id = stored.id;
    let entry = LedgerEntry::opening(id, Amount::new(1_000), fixture_timestamp());
    let expected = vec![entry.clone()];
    let mut store = MockLedgerStore::new();
    store
        .expect_find_account()
        .return_once(move |_| Ok(Some(stored)));
    store
        .expect_list_entries()
        .return_once(move |_| Ok(vec![entry]));

    let entries = service(store)
        .list_entries(&admin(), &id)
        .await
        .expect("entries readable");
    assert_eq!(entries, expected);
}
