//! Settlement and concurrency properties of the transfer service over the
//! in-memory ledger.

use std::sync::Arc;
use std::time::Duration;

use banksystem::domain::ports::{
    AccountCommand, AccountQuery, CreateAccountRequest, TransferCommand, TransferRequest,
};
use banksystem::domain::{
    AccessPolicy, AccountId, AccountService, Amount, Currency, DEFAULT_ELEVATED_ROLE, ErrorCode,
    IdempotencyKey, Principal, SubjectId, TransferService, replay_balance,
};
use banksystem::outbound::ledger::InMemoryLedgerStore;
use futures::future::join_all;
use mockable::DefaultClock;
use rstest::{fixture, rstest};

struct Bank {
    accounts: Arc<AccountService<InMemoryLedgerStore>>,
    transfers: Arc<TransferService<InMemoryLedgerStore>>,
    admin: Principal,
}

impl Bank {
    async fn open(&self, opening: i64) -> AccountId {
        self.accounts
            .create_account(
                &self.admin,
                CreateAccountRequest {
                    currency: usd(),
                    opening_balance: Some(Amount::new(opening)),
                },
            )
            .await
            .expect("open account")
            .id
    }

    async fn balance(&self, id: AccountId) -> i64 {
        self.accounts
            .get_balance(&self.admin, &id)
            .await
            .expect("balance")
            .balance
            .minor_units()
    }

    fn request(&self, from: AccountId, to: AccountId, amount: i64, key: String) -> TransferRequest {
        TransferRequest {
            from_id: from,
            to_id: to,
            amount: Amount::new(amount),
            currency: usd(),
            idempotency_key: IdempotencyKey::new(key).expect("key"),
        }
    }
}

fn usd() -> Currency {
    Currency::new("USD").expect("currency")
}

#[fixture]
fn bank() -> Bank {
    let store = Arc::new(InMemoryLedgerStore::new());
    let policy = AccessPolicy::default();
    let clock = Arc::new(DefaultClock);
    Bank {
        accounts: Arc::new(AccountService::new(
            Arc::clone(&store),
            policy.clone(),
            clock.clone(),
        )),
        transfers: Arc::new(TransferService::new(store, policy, clock)),
        admin: Principal::new(
            SubjectId::new("ops").expect("subject"),
            [DEFAULT_ELEVATED_ROLE],
        ),
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_debits_never_overdraw(bank: Bank) {
    let a = bank.open(1_000).await;
    let b = bank.open(0).await;

    let attempts = (0..20).map(|i| {
        let transfers = Arc::clone(&bank.transfers);
        let principal = bank.admin.clone();
        let request = bank.request(a, b, 100, format!("debit-{i}"));
        tokio::spawn(async move { transfers.transfer(&principal, request).await })
    });
    let outcomes: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("task completes"))
        .collect();

    let committed = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(committed, 10);
    assert!(
        outcomes
            .iter()
            .filter_map(|outcome| outcome.as_ref().err())
            .all(|err| err.code() == ErrorCode::InsufficientFunds)
    );
    assert_eq!(bank.balance(a).await, 0);
    assert_eq!(bank.balance(b).await, 1_000);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposite_transfers_complete_without_deadlock(bank: Bank) {
    let a = bank.open(5_000).await;
    let b = bank.open(5_000).await;

    let attempts = (0..40).map(|i| {
        let transfers = Arc::clone(&bank.transfers);
        let principal = bank.admin.clone();
        let request = if i % 2 == 0 {
            bank.request(a, b, 7, format!("ab-{i}"))
        } else {
            bank.request(b, a, 3, format!("ba-{i}"))
        };
        tokio::spawn(async move { transfers.transfer(&principal, request).await })
    });
    let outcomes = tokio::time::timeout(Duration::from_secs(10), join_all(attempts))
        .await
        .expect("transfers finish without deadlock");

    assert!(
        outcomes
            .into_iter()
            .all(|joined| joined.expect("task completes").is_ok())
    );
    assert_eq!(bank.balance(a).await, 5_000 - 20 * 7 + 20 * 3);
    assert_eq!(bank.balance(b).await, 5_000 + 20 * 7 - 20 * 3);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_retries_apply_once(bank: Bank) {
    let a = bank.open(1_000).await;
    let b = bank.open(0).await;

    let retries = (0..8).map(|_| {
        let transfers = Arc::clone(&bank.transfers);
        let principal = bank.admin.clone();
        let request = bank.request(a, b, 250, "same-key".to_owned());
        tokio::spawn(async move { transfers.transfer(&principal, request).await })
    });
    let outcomes: Vec<_> = join_all(retries)
        .await
        .into_iter()
        .map(|joined| joined.expect("task completes").expect("transfer succeeds"))
        .collect();

    let first = &outcomes[0].record.id;
    assert!(outcomes.iter().all(|outcome| &outcome.record.id == first));
    assert_eq!(outcomes.iter().filter(|outcome| !outcome.replayed).count(), 1);
    assert_eq!(bank.balance(a).await, 750);

    let entries = bank
        .accounts
        .list_entries(&bank.admin, &a)
        .await
        .expect("entries");
    assert_eq!(replay_balance(&entries), Some(Amount::new(750)));
}

#[rstest]
#[tokio::test]
async fn overflowing_credit_fails_and_releases_the_hold(bank: Bank) {
    let source = bank.open(1_000).await;
    let full = bank.open(i64::MAX).await;
    let spare = bank.open(0).await;

    let err = bank
        .transfers
        .transfer(&bank.admin, bank.request(source, full, 500, "k1".to_owned()))
        .await
        .expect_err("credit cannot fit");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);

    let view = bank
        .accounts
        .get_balance(&bank.admin, &source)
        .await
        .expect("balance");
    assert_eq!(view.balance.minor_units(), 1_000);
    assert_eq!(view.available.minor_units(), 1_000);

    let replay = bank
        .transfers
        .transfer(&bank.admin, bank.request(source, full, 500, "k1".to_owned()))
        .await
        .expect_err("failure is replayed");
    assert_eq!(replay.code(), ErrorCode::InvalidRequest);

    let outcome = bank
        .transfers
        .transfer(&bank.admin, bank.request(source, spare, 600, "k2".to_owned()))
        .await
        .expect("funds were released");
    assert!(!outcome.replayed);
    assert_eq!(bank.balance(source).await, 400);
}
