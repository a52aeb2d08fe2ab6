//! Shared fixtures for unit tests across the crate.

use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};
use mockable::Clock;
use serde_json::json;

use crate::domain::{
    Account, AccountId, Amount, Currency, DEFAULT_ELEVATED_ROLE, IdempotencyKey, Principal,
    SubjectId, TransactionId, TransactionRecord, TransactionStatus, canonicalize_and_hash,
};

pub(crate) fn fixture_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53)
        .single()
        .expect("valid fixture timestamp")
}

/// Clock pinned to a single instant.
pub(crate) struct FixtureClock {
    utc_now: DateTime<Utc>,
}

impl FixtureClock {
    pub(crate) fn at(utc_now: DateTime<Utc>) -> Self {
        Self { utc_now }
    }
}

impl Clock for FixtureClock {
    fn local(&self) -> DateTime<Local> {
        self.utc_now.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.utc_now
    }
}

pub(crate) fn fixture_clock() -> Arc<dyn Clock> {
    Arc::new(FixtureClock::at(fixture_timestamp()))
}

pub(crate) fn subject(raw: &str) -> SubjectId {
    SubjectId::new(raw).expect("valid subject")
}

pub(crate) fn customer(raw: &str) -> Principal {
    Principal::new(subject(raw), ["customer"])
}

pub(crate) fn admin() -> Principal {
    Principal::new(subject("ops-admin"), [DEFAULT_ELEVATED_ROLE])
}

pub(crate) fn usd() -> Currency {
    Currency::new("USD").expect("valid currency")
}

pub(crate) fn key(raw: &str) -> IdempotencyKey {
    IdempotencyKey::new(raw).expect("valid idempotency key")
}

pub(crate) fn account(owner: &str, balance: i64) -> Account {
    let mut account = Account::open(subject(owner), usd(), fixture_timestamp());
    account.balance = Amount::new(balance);
    account
}

pub(crate) fn pending_record(
    initiator: &str,
    from_id: AccountId,
    to_id: AccountId,
    amount: i64,
) -> TransactionRecord {
    let payload_hash = canonicalize_and_hash(&json!({
        "fromId": from_id.to_string(),
        "toId": to_id.to_string(),
        "amount": amount,
        "currency": "USD",
    }))
    .expect("hash fixture payload");
    TransactionRecord {
        id: TransactionId::random(),
        initiator: subject(initiator),
        from_id,
        to_id,
        amount: Amount::new(amount),
        currency: usd(),
        status: TransactionStatus::Pending,
        idempotency_key: IdempotencyKey::random(),
        payload_hash,
        reserved: false,
        failure_reason: None,
        created_at: fixture_timestamp(),
        updated_at: fixture_timestamp(),
    }
}
