//! PostgreSQL-backed `LedgerStore` using Diesel.
//!
//! Every mutating operation runs inside one database transaction. Rows are
//! locked with `SELECT ... FOR UPDATE` in a fixed order: the transaction row
//! first, then account rows in ascending id order. Two settlements touching
//! the same accounts therefore queue instead of deadlocking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, AsyncPgConnection, RunQueryDsl};
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{LedgerStore, LedgerStoreError};
use crate::domain::{
    Account, AccountId, FailureReason, IdempotencyKey, LedgerEntry, OpenedAccount,
    ReservationHandle, SubjectId, TransactionId, TransactionRecord, TransactionStatus,
};
use crate::outbound::ledger::rules::{check_pending, place_hold, release_hold, settle_hold};

use super::models::{AccountRow, LedgerEntryRow, NewLedgerEntryRow, TransactionRow};
use super::pool::{DbPool, PoolError};
use super::schema::{accounts, ledger_entries, transactions};

/// Diesel-backed ledger store.
#[derive(Clone)]
pub struct DieselLedgerStore {
    pool: DbPool,
}

impl DieselLedgerStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Failure inside a database transaction: either the driver or a ledger rule.
#[derive(Debug)]
enum TxError {
    Diesel(diesel::result::Error),
    Ledger(LedgerStoreError),
}

impl From<diesel::result::Error> for TxError {
    fn from(value: diesel::result::Error) -> Self {
        Self::Diesel(value)
    }
}

impl From<LedgerStoreError> for TxError {
    fn from(value: LedgerStoreError) -> Self {
        Self::Ledger(value)
    }
}

fn map_tx_error(error: TxError) -> LedgerStoreError {
    match error {
        TxError::Diesel(err) => map_diesel_error(err),
        TxError::Ledger(err) => err,
    }
}

fn map_pool_error(error: PoolError) -> LedgerStoreError {
    LedgerStoreError::connection(error.into_message())
}

fn map_diesel_error(error: diesel::result::Error) -> LedgerStoreError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => LedgerStoreError::not_found("record not found"),
        DieselError::QueryBuilderError(_) => LedgerStoreError::query("database query error"),
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            LedgerStoreError::duplicate_key(
                info.constraint_name()
                    .unwrap_or("unique constraint")
                    .to_owned(),
            )
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            LedgerStoreError::connection("database connection error")
        }
        _ => LedgerStoreError::query("database error"),
    }
}

fn convert_rows<R, T>(rows: Vec<R>) -> Result<Vec<T>, LedgerStoreError>
where
    T: TryFrom<R, Error = LedgerStoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Lock a transaction row and require it to still be pending.
async fn lock_pending(
    conn: &mut AsyncPgConnection,
    id: TransactionId,
) -> Result<TransactionRecord, TxError> {
    let row: Option<TransactionRow> = transactions::table
        .find(*id.as_uuid())
        .select(TransactionRow::as_select())
        .for_update()
        .get_result(conn)
        .await
        .optional()?;
    let row = row.ok_or_else(|| LedgerStoreError::not_found(format!("transaction {id}")))?;
    let record = TransactionRecord::try_from(row)?;
    check_pending(&record)?;
    Ok(record)
}

async fn lock_account(conn: &mut AsyncPgConnection, id: AccountId) -> Result<Account, TxError> {
    let row: Option<AccountRow> = accounts::table
        .find(*id.as_uuid())
        .select(AccountRow::as_select())
        .for_update()
        .get_result(conn)
        .await
        .optional()?;
    let row = row.ok_or_else(|| LedgerStoreError::not_found(format!("account {id}")))?;
    Ok(Account::try_from(row)?)
}

/// Lock both accounts in ascending id order; returns `(from, to)`.
async fn lock_pair(
    conn: &mut AsyncPgConnection,
    from: AccountId,
    to: AccountId,
) -> Result<(Account, Account), TxError> {
    if from == to {
        return Err(LedgerStoreError::invalid_state(
            "transfer source and destination are the same account",
        )
        .into());
    }
    if from < to {
        let from_account = lock_account(conn, from).await?;
        let to_account = lock_account(conn, to).await?;
        Ok((from_account, to_account))
    } else {
        let to_account = lock_account(conn, to).await?;
        let from_account = lock_account(conn, from).await?;
        Ok((from_account, to_account))
    }
}

async fn write_transaction_state(
    conn: &mut AsyncPgConnection,
    record: &TransactionRecord,
) -> Result<(), TxError> {
    diesel::update(transactions::table.find(*record.id.as_uuid()))
        .set((
            transactions::status.eq(record.status.as_str()),
            transactions::reserved.eq(record.reserved),
            transactions::failure_reason.eq(record.failure_reason.map(FailureReason::as_str)),
            transactions::updated_at.eq(record.updated_at),
        ))
        .execute(conn)
        .await?;
    Ok(())
}

async fn write_reserved(
    conn: &mut AsyncPgConnection,
    account: AccountId,
    reserved: i64,
) -> Result<(), TxError> {
    diesel::update(accounts::table.find(*account.as_uuid()))
        .set(accounts::reserved.eq(reserved))
        .execute(conn)
        .await?;
    Ok(())
}

#[async_trait]
impl LedgerStore for DieselLedgerStore {
    async fn insert_account(&self, opened: &OpenedAccount) -> Result<(), LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let account_row = AccountRow::from(&opened.account);
        let entry_row = opened.opening_entry.as_ref().map(NewLedgerEntryRow::from);

        conn.transaction::<_, TxError, _>(|conn| {
            async move {
                diesel::insert_into(accounts::table)
                    .values(&account_row)
                    .execute(conn)
                    .await?;
                if let Some(entry) = &entry_row {
                    diesel::insert_into(ledger_entries::table)
                        .values(entry)
                        .execute(conn)
                        .await?;
                }
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(map_tx_error)
    }

    async fn find_account(&self, id: &AccountId) -> Result<Option<Account>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<AccountRow> = accounts::table
            .find(*id.as_uuid())
            .select(AccountRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(Account::try_from).transpose()
    }

    async fn find_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<Option<TransactionRecord>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<TransactionRow> = transactions::table
            .find(*id.as_uuid())
            .select(TransactionRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(TransactionRecord::try_from).transpose()
    }

    async fn find_transaction_by_key(
        &self,
        initiator: &SubjectId,
        key: &IdempotencyKey,
    ) -> Result<Option<TransactionRecord>, LedgerStoreError> {
        let initiator: &str = initiator.as_ref();
        let key: &str = key.as_ref();
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<TransactionRow> = transactions::table
            .filter(transactions::initiator_subject.eq(initiator))
            .filter(transactions::idempotency_key.eq(key))
            .select(TransactionRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(TransactionRecord::try_from).transpose()
    }

    async fn begin_transfer(&self, record: &TransactionRecord) -> Result<(), LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(transactions::table)
            .values(&TransactionRow::from(record))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn reserve(&self, id: &TransactionId) -> Result<ReservationHandle, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let id = *id;

        conn.transaction::<_, TxError, _>(|conn| {
            async move {
                let mut record = lock_pending(conn, id).await?;
                let handle = ReservationHandle::for_record(&record);
                if record.reserved {
                    return Ok(handle);
                }
                let (from, to) = lock_pair(conn, record.from_id, record.to_id).await?;
                let reserved = place_hold(&from, &to, &record)?;
                write_reserved(conn, from.id, reserved.minor_units()).await?;
                record.reserved = true;
                write_transaction_state(conn, &record).await?;
                Ok(handle)
            }
            .scope_boxed()
        })
        .await
        .map_err(map_tx_error)
    }

    async fn commit(
        &self,
        handle: &ReservationHandle,
        at: DateTime<Utc>,
    ) -> Result<TransactionRecord, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let id = handle.transaction_id;

        conn.transaction::<_, TxError, _>(|conn| {
            async move {
                let mut record = lock_pending(conn, id).await?;
                let (from, to) = lock_pair(conn, record.from_id, record.to_id).await?;
                let posting = settle_hold(&from, &to, &record, at)?;

                diesel::update(accounts::table.find(*from.id.as_uuid()))
                    .set((
                        accounts::balance.eq(posting.from_balance.minor_units()),
                        accounts::reserved.eq(posting.from_reserved.minor_units()),
                        accounts::version.eq(from.version + 1),
                    ))
                    .execute(conn)
                    .await?;
                diesel::update(accounts::table.find(*to.id.as_uuid()))
                    .set((
                        accounts::balance.eq(posting.to_balance.minor_units()),
                        accounts::version.eq(to.version + 1),
                    ))
                    .execute(conn)
                    .await?;
                let entries = [
                    NewLedgerEntryRow::from(&posting.debit),
                    NewLedgerEntryRow::from(&posting.credit),
                ];
                diesel::insert_into(ledger_entries::table)
                    .values(&entries[..])
                    .execute(conn)
                    .await?;

                record.status = TransactionStatus::Committed;
                record.reserved = false;
                record.updated_at = at;
                write_transaction_state(conn, &record).await?;
                Ok(record)
            }
            .scope_boxed()
        })
        .await
        .map_err(map_tx_error)
    }

    async fn rollback(
        &self,
        id: &TransactionId,
        reason: FailureReason,
        at: DateTime<Utc>,
    ) -> Result<TransactionRecord, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let id = *id;

        conn.transaction::<_, TxError, _>(|conn| {
            async move {
                let mut record = lock_pending(conn, id).await?;
                if record.reserved {
                    let from = lock_account(conn, record.from_id).await?;
                    let reserved = release_hold(&from, &record)?;
                    write_reserved(conn, from.id, reserved.minor_units()).await?;
                }
                record.status = TransactionStatus::Failed;
                record.reserved = false;
                record.failure_reason = Some(reason);
                record.updated_at = at;
                write_transaction_state(conn, &record).await?;
                Ok(record)
            }
            .scope_boxed()
        })
        .await
        .map_err(map_tx_error)
    }

    async fn list_pending(
        &self,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<TransactionRecord>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<TransactionRow> = transactions::table
            .filter(transactions::status.eq(TransactionStatus::Pending.as_str()))
            .filter(transactions::created_at.lt(created_before))
            .order_by(transactions::created_at.asc())
            .select(TransactionRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        convert_rows(rows)
    }

    async fn list_entries(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<LedgerEntry>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let account = *account_id.as_uuid();
        let exists: Option<Uuid> = accounts::table
            .find(account)
            .select(accounts::id)
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        if exists.is_none() {
            return Err(LedgerStoreError::not_found(format!("account {account_id}")));
        }

        let rows: Vec<LedgerEntryRow> = ledger_entries::table
            .filter(ledger_entries::account_id.eq(account))
            .order_by(ledger_entries::seq.asc())
            .select(LedgerEntryRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        convert_rows(rows)
    }

    async fn ping(&self) -> Result<(), LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::sql_query("SELECT 1")
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::{DatabaseErrorKind, Error as DieselError};
    use rstest::rstest;

    fn database_error(kind: DatabaseErrorKind) -> DieselError {
        DieselError::DatabaseError(kind, Box::new("driver detail".to_string()))
    }

    #[rstest]
    fn pool_errors_are_connection_failures() {
        let err = map_pool_error(PoolError::checkout("timed out"));
        assert!(matches!(err, LedgerStoreError::Connection { .. }));
        assert!(err.to_string().contains("timed out"));
    }

    #[rstest]
    fn unique_violation_is_a_duplicate_key() {
        let err = map_diesel_error(database_error(DatabaseErrorKind::UniqueViolation));
        assert!(matches!(err, LedgerStoreError::DuplicateKey { .. }));
    }

    #[rstest]
    fn closed_connection_is_a_connection_failure() {
        let err = map_diesel_error(database_error(DatabaseErrorKind::ClosedConnection));
        assert!(matches!(err, LedgerStoreError::Connection { .. }));
    }

    #[rstest]
    #[case(database_error(DatabaseErrorKind::CheckViolation))]
    #[case(database_error(DatabaseErrorKind::ForeignKeyViolation))]
    #[case(DieselError::RollbackTransaction)]
    fn other_failures_are_query_errors(#[case] error: DieselError) {
        assert!(matches!(
            map_diesel_error(error),
            LedgerStoreError::Query { .. }
        ));
    }

    #[rstest]
    fn ledger_rule_failures_pass_through_transactions() {
        let err = map_tx_error(TxError::from(LedgerStoreError::insufficient_funds("short")));
        assert!(matches!(err, LedgerStoreError::InsufficientFunds { .. }));
        let err = map_tx_error(TxError::from(DieselError::NotFound));
        assert!(matches!(err, LedgerStoreError::NotFound { .. }));
    }
}
