//! Diesel row structs and their conversions to domain types.
//!
//! Rows are an adapter detail; only the conversions below cross into the
//! domain. Corrupt stored values surface as `LedgerStoreError::Query`.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::ports::LedgerStoreError;
use crate::domain::{
    Account, AccountId, AccountStatus, Amount, Currency, EntryId, EntryKind, FailureReason,
    IdempotencyKey, LedgerEntry, PayloadHash, SubjectId, TransactionId, TransactionRecord,
    TransactionStatus,
};

use super::schema::{accounts, ledger_entries, transactions};

fn corrupt(column: &str, err: impl std::fmt::Display) -> LedgerStoreError {
    LedgerStoreError::query(format!("corrupt {column} in database: {err}"))
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = accounts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct AccountRow {
    pub id: Uuid,
    pub owner_subject: String,
    pub currency: String,
    pub balance: i64,
    pub reserved: i64,
    pub version: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for AccountRow {
    fn from(account: &Account) -> Self {
        Self {
            id: *account.id.as_uuid(),
            owner_subject: account.owner.to_string(),
            currency: account.currency.to_string(),
            balance: account.balance.minor_units(),
            reserved: account.reserved.minor_units(),
            version: account.version,
            status: account.status.as_str().to_owned(),
            created_at: account.created_at,
        }
    }
}

impl TryFrom<AccountRow> for Account {
    type Error = LedgerStoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: AccountId::from_uuid(row.id),
            owner: SubjectId::new(row.owner_subject).map_err(|err| corrupt("owner_subject", err))?,
            currency: Currency::new(&row.currency).map_err(|err| corrupt("currency", err))?,
            balance: Amount::new(row.balance),
            reserved: Amount::new(row.reserved),
            version: row.version,
            status: row
                .status
                .parse::<AccountStatus>()
                .map_err(|err| corrupt("status", err))?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct TransactionRow {
    pub id: Uuid,
    pub initiator_subject: String,
    pub idempotency_key: String,
    pub payload_hash: Vec<u8>,
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub reserved: bool,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&TransactionRecord> for TransactionRow {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            id: *record.id.as_uuid(),
            initiator_subject: record.initiator.to_string(),
            idempotency_key: record.idempotency_key.to_string(),
            payload_hash: record.payload_hash.as_bytes().to_vec(),
            from_account_id: *record.from_id.as_uuid(),
            to_account_id: *record.to_id.as_uuid(),
            amount: record.amount.minor_units(),
            currency: record.currency.to_string(),
            status: record.status.as_str().to_owned(),
            reserved: record.reserved,
            failure_reason: record.failure_reason.map(|reason| reason.as_str().to_owned()),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = LedgerStoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: TransactionId::from_uuid(row.id),
            initiator: SubjectId::new(row.initiator_subject)
                .map_err(|err| corrupt("initiator_subject", err))?,
            from_id: AccountId::from_uuid(row.from_account_id),
            to_id: AccountId::from_uuid(row.to_account_id),
            amount: Amount::new(row.amount),
            currency: Currency::new(&row.currency).map_err(|err| corrupt("currency", err))?,
            status: row
                .status
                .parse::<TransactionStatus>()
                .map_err(|err| corrupt("status", err))?,
            idempotency_key: IdempotencyKey::new(row.idempotency_key)
                .map_err(|err| corrupt("idempotency_key", err))?,
            payload_hash: PayloadHash::try_from_bytes(&row.payload_hash)
                .map_err(|err| corrupt("payload_hash", err))?,
            reserved: row.reserved,
            failure_reason: row
                .failure_reason
                .map(|reason| reason.parse::<FailureReason>())
                .transpose()
                .map_err(|err| corrupt("failure_reason", err))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = ledger_entries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct LedgerEntryRow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub transaction_id: Option<Uuid>,
    pub kind: String,
    pub delta: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ledger_entries)]
pub(crate) struct NewLedgerEntryRow<'a> {
    pub id: Uuid,
    pub account_id: Uuid,
    pub transaction_id: Option<Uuid>,
    pub kind: &'a str,
    pub delta: i64,
    pub created_at: DateTime<Utc>,
}

impl<'a> From<&'a LedgerEntry> for NewLedgerEntryRow<'a> {
    fn from(entry: &'a LedgerEntry) -> Self {
        Self {
            id: *entry.id.as_uuid(),
            account_id: *entry.account_id.as_uuid(),
            transaction_id: entry.transaction_id.map(|id| *id.as_uuid()),
            kind: entry.kind.as_str(),
            delta: entry.delta.minor_units(),
            created_at: entry.created_at,
        }
    }
}

impl TryFrom<LedgerEntryRow> for LedgerEntry {
    type Error = LedgerStoreError;

    fn try_from(row: LedgerEntryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: EntryId::from_uuid(row.id),
            account_id: AccountId::from_uuid(row.account_id),
            transaction_id: row.transaction_id.map(TransactionId::from_uuid),
            kind: row.kind.parse::<EntryKind>().map_err(|err| corrupt("kind", err))?,
            delta: Amount::new(row.delta),
            created_at: row.created_at,
        })
    }
}
