//! In-process ledger store with per-account async locks.
//!
//! Each account sits behind its own `tokio::sync::Mutex`. Multi-account
//! operations take those locks in ascending [`AccountId`] order and only then
//! the transaction book lock, so no two operations can wait on each other in
//! a cycle. Guards are owned and dropped on every exit path, including
//! cancellation of the calling future.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::domain::ports::{LedgerStore, LedgerStoreError};
use crate::domain::{
    Account, AccountId, FailureReason, IdempotencyKey, LedgerEntry, OpenedAccount,
    ReservationHandle, SubjectId, TransactionId, TransactionRecord, TransactionStatus,
};

use super::rules::{check_pending, place_hold, release_hold, settle_hold};

#[derive(Debug)]
struct AccountSlot {
    account: Account,
    entries: Vec<LedgerEntry>,
}

#[derive(Debug, Default)]
struct TransactionBook {
    records: HashMap<TransactionId, TransactionRecord>,
    by_key: HashMap<(SubjectId, IdempotencyKey), TransactionId>,
}

impl TransactionBook {
    fn pending_mut(
        &mut self,
        id: &TransactionId,
    ) -> Result<&mut TransactionRecord, LedgerStoreError> {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| LedgerStoreError::not_found(format!("transaction {id}")))?;
        check_pending(record)?;
        Ok(record)
    }
}

type Slot = Arc<Mutex<AccountSlot>>;

/// Ledger store kept entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    accounts: RwLock<HashMap<AccountId, Slot>>,
    book: Mutex<TransactionBook>,
}

impl InMemoryLedgerStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, id: &AccountId) -> Result<Slot, LedgerStoreError> {
        self.accounts
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerStoreError::not_found(format!("account {id}")))
    }

    /// Lock both accounts in ascending id order; returns `(from, to)`.
    async fn lock_pair(
        &self,
        from: &AccountId,
        to: &AccountId,
    ) -> Result<(OwnedMutexGuard<AccountSlot>, OwnedMutexGuard<AccountSlot>), LedgerStoreError>
    {
        if from == to {
            return Err(LedgerStoreError::invalid_state(
                "transfer source and destination are the same account",
            ));
        }
        let from_slot = self.slot(from).await?;
        let to_slot = self.slot(to).await?;
        if from < to {
            let from_guard = from_slot.lock_owned().await;
            let to_guard = to_slot.lock_owned().await;
            Ok((from_guard, to_guard))
        } else {
            let to_guard = to_slot.lock_owned().await;
            let from_guard = from_slot.lock_owned().await;
            Ok((from_guard, to_guard))
        }
    }

    async fn snapshot(&self, id: &TransactionId) -> Result<TransactionRecord, LedgerStoreError> {
        self.book
            .lock()
            .await
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerStoreError::not_found(format!("transaction {id}")))
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert_account(&self, opened: &OpenedAccount) -> Result<(), LedgerStoreError> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&opened.account.id) {
            return Err(LedgerStoreError::query(format!(
                "account {} already exists",
                opened.account.id
            )));
        }
        let slot = AccountSlot {
            account: opened.account.clone(),
            entries: opened.opening_entry.iter().cloned().collect(),
        };
        accounts.insert(opened.account.id, Arc::new(Mutex::new(slot)));
        Ok(())
    }

    async fn find_account(&self, id: &AccountId) -> Result<Option<Account>, LedgerStoreError> {
        let slot = self.accounts.read().await.get(id).cloned();
        match slot {
            Some(slot) => Ok(Some(slot.lock().await.account.clone())),
            None => Ok(None),
        }
    }

    async fn find_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<Option<TransactionRecord>, LedgerStoreError> {
        Ok(self.book.lock().await.records.get(id).cloned())
    }

    async fn find_transaction_by_key(
        &self,
        initiator: &SubjectId,
        key: &IdempotencyKey,
    ) -> Result<Option<TransactionRecord>, LedgerStoreError> {
        let book = self.book.lock().await;
        Ok(book
            .by_key
            .get(&(initiator.clone(), key.clone()))
            .and_then(|id| book.records.get(id))
            .cloned())
    }

    async fn begin_transfer(&self, record: &TransactionRecord) -> Result<(), LedgerStoreError> {
        let mut book = self.book.lock().await;
        let index = (record.initiator.clone(), record.idempotency_key.clone());
        if book.by_key.contains_key(&index) {
            return Err(LedgerStoreError::duplicate_key(format!(
                "{}/{}",
                record.initiator, record.idempotency_key
            )));
        }
        book.by_key.insert(index, record.id);
        book.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn reserve(&self, id: &TransactionId) -> Result<ReservationHandle, LedgerStoreError> {
        let snapshot = self.snapshot(id).await?;
        let (mut from, to) = self.lock_pair(&snapshot.from_id, &snapshot.to_id).await?;
        let mut book = self.book.lock().await;
        let record = book.pending_mut(id)?;
        let handle = ReservationHandle::for_record(record);
        if !record.reserved {
            from.account.reserved = place_hold(&from.account, &to.account, record)?;
            record.reserved = true;
        }
        Ok(handle)
    }

    async fn commit(
        &self,
        handle: &ReservationHandle,
        at: DateTime<Utc>,
    ) -> Result<TransactionRecord, LedgerStoreError> {
        let snapshot = self.snapshot(&handle.transaction_id).await?;
        let (mut from, mut to) = self.lock_pair(&snapshot.from_id, &snapshot.to_id).await?;
        let mut book = self.book.lock().await;
        let record = book.pending_mut(&handle.transaction_id)?;
        let posting = settle_hold(&from.account, &to.account, record, at)?;

        from.account.balance = posting.from_balance;
        from.account.reserved = posting.from_reserved;
        from.account.version += 1;
        from.entries.push(posting.debit);
        to.account.balance = posting.to_balance;
        to.account.version += 1;
        to.entries.push(posting.credit);

        record.status = TransactionStatus::Committed;
        record.reserved = false;
        record.updated_at = at;
        Ok(record.clone())
    }

    async fn rollback(
        &self,
        id: &TransactionId,
        reason: FailureReason,
        at: DateTime<Utc>,
    ) -> Result<TransactionRecord, LedgerStoreError> {
        let snapshot = self.snapshot(id).await?;
        let source = self.slot(&snapshot.from_id).await?;
        let mut from = source.lock_owned().await;
        let mut book = self.book.lock().await;
        let record = book.pending_mut(id)?;
        from.account.reserved = release_hold(&from.account, record)?;
        record.status = TransactionStatus::Failed;
        record.reserved = false;
        record.failure_reason = Some(reason);
        record.updated_at = at;
        Ok(record.clone())
    }

    async fn list_pending(
        &self,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<TransactionRecord>, LedgerStoreError> {
        let book = self.book.lock().await;
        let mut pending: Vec<_> = book
            .records
            .values()
            .filter(|record| {
                record.status == TransactionStatus::Pending && record.created_at < created_before
            })
            .cloned()
            .collect();
        pending.sort_by_key(|record| record.created_at);
        Ok(pending)
    }

    async fn list_entries(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<LedgerEntry>, LedgerStoreError> {
        let slot = self.slot(account_id).await?;
        let guard = slot.lock().await;
        Ok(guard.entries.clone())
    }

    async fn ping(&self) -> Result<(), LedgerStoreError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
