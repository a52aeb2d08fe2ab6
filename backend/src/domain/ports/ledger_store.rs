//! Driven port for durable account and transaction state.
//!
//! Adapters own the atomicity guarantees: every method either applies all of
//! its effects or none of them, and account locks are always taken in
//! ascending [`AccountId`] order so opposing transfers cannot deadlock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Account, AccountId, FailureReason, IdempotencyKey, LedgerEntry, OpenedAccount,
    ReservationHandle, SubjectId, TransactionId, TransactionRecord,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by ledger store adapters.
    pub enum LedgerStoreError {
        /// The backing store could not be reached.
        Connection { message: String } => "ledger store connection failed: {message}",
        /// A query failed during execution.
        Query { message: String } => "ledger store query failed: {message}",
        /// A referenced account or transaction does not exist.
        NotFound { message: String } => "ledger record not found: {message}",
        /// The source account cannot cover the hold.
        InsufficientFunds { message: String } => "insufficient funds: {message}",
        /// The `(initiator, idempotency key)` pair is already taken.
        DuplicateKey { message: String } => "idempotency key already used: {message}",
        /// The transaction is no longer pending.
        InvalidState { message: String } => "transaction not pending: {message}",
        /// An account involved in settlement is inactive or mismatched.
        AccountUnavailable { message: String } => "account unavailable: {message}",
        /// Settling would push a balance past the representable range.
        BalanceOverflow { message: String } => "balance overflow: {message}",
    }
}

/// Persistence boundary for accounts, ledger entries and transfers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persist a new account together with its opening entry, if any.
    async fn insert_account(&self, opened: &OpenedAccount) -> Result<(), LedgerStoreError>;

    /// Load an account by identifier.
    async fn find_account(&self, id: &AccountId) -> Result<Option<Account>, LedgerStoreError>;

    /// Load a transaction by identifier.
    async fn find_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<Option<TransactionRecord>, LedgerStoreError>;

    /// Load the transaction an initiator created with `key`.
    async fn find_transaction_by_key(
        &self,
        initiator: &SubjectId,
        key: &IdempotencyKey,
    ) -> Result<Option<TransactionRecord>, LedgerStoreError>;

    /// Insert a `Pending` transaction.
    ///
    /// Returns [`LedgerStoreError::DuplicateKey`] when another record already
    /// holds the same initiator and key.
    async fn begin_transfer(&self, record: &TransactionRecord) -> Result<(), LedgerStoreError>;

    /// Hold `amount` on the source account under its exclusive lock.
    ///
    /// Calling `reserve` again for the same pending transaction returns the
    /// existing hold. Fails with `InsufficientFunds` when
    /// `balance - reserved < amount`, `AccountUnavailable` when either account
    /// is inactive, `BalanceOverflow` when the credit could not be applied,
    /// and `InvalidState` once the transaction is terminal.
    async fn reserve(&self, id: &TransactionId) -> Result<ReservationHandle, LedgerStoreError>;

    /// Settle a reserved transfer in one atomic step.
    ///
    /// Locks both accounts in ascending id order, converts the hold into a
    /// debit, credits the destination, appends both ledger entries, bumps both
    /// versions and marks the transaction `Committed`.
    async fn commit(
        &self,
        handle: &ReservationHandle,
        at: DateTime<Utc>,
    ) -> Result<TransactionRecord, LedgerStoreError>;

    /// Release any hold and mark the transaction `Failed`.
    async fn rollback(
        &self,
        id: &TransactionId,
        reason: FailureReason,
        at: DateTime<Utc>,
    ) -> Result<TransactionRecord, LedgerStoreError>;

    /// Pending transactions created strictly before `created_before`, oldest
    /// first.
    async fn list_pending(
        &self,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<TransactionRecord>, LedgerStoreError>;

    /// Ledger entries for an account in insertion order.
    async fn list_entries(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<LedgerEntry>, LedgerStoreError>;

    /// Cheap connectivity probe used by readiness checks.
    async fn ping(&self) -> Result<(), LedgerStoreError>;
}
