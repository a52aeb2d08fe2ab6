//! Balance arithmetic shared by every ledger store backend.
//!
//! Stores lock the rows they need and then ask these functions what the new
//! state should be. Nothing here performs I/O.

use chrono::{DateTime, Utc};

use crate::domain::ports::LedgerStoreError;
use crate::domain::{
    Account, AccountId, Amount, EntryId, EntryKind, LedgerEntry, TransactionRecord,
    TransactionStatus,
};

/// Post-commit state for both sides of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Posting {
    pub from_balance: Amount,
    pub from_reserved: Amount,
    pub to_balance: Amount,
    pub debit: LedgerEntry,
    pub credit: LedgerEntry,
}

fn overflow(account: &AccountId) -> LedgerStoreError {
    LedgerStoreError::balance_overflow(format!("account {account}"))
}

/// Refuse transitions out of a terminal state.
pub(crate) fn check_pending(record: &TransactionRecord) -> Result<(), LedgerStoreError> {
    if record.status == TransactionStatus::Pending {
        Ok(())
    } else {
        Err(LedgerStoreError::invalid_state(format!(
            "transaction {} is {}",
            record.id, record.status
        )))
    }
}

fn ensure_settleable(
    account: &Account,
    record: &TransactionRecord,
) -> Result<(), LedgerStoreError> {
    if !account.is_active() {
        return Err(LedgerStoreError::account_unavailable(format!(
            "account {} is inactive",
            account.id
        )));
    }
    if account.currency != record.currency {
        return Err(LedgerStoreError::account_unavailable(format!(
            "account {} uses {}",
            account.id, account.currency
        )));
    }
    Ok(())
}

/// New `reserved` figure for the source once the hold is placed.
pub(crate) fn place_hold(
    from: &Account,
    to: &Account,
    record: &TransactionRecord,
) -> Result<Amount, LedgerStoreError> {
    ensure_settleable(from, record)?;
    ensure_settleable(to, record)?;
    let available = from.available();
    if available < record.amount {
        return Err(LedgerStoreError::insufficient_funds(format!(
            "account {} has {} available, needs {}",
            from.id, available, record.amount
        )));
    }
    to.balance
        .checked_add(record.amount)
        .ok_or_else(|| overflow(&to.id))?;
    from.reserved
        .checked_add(record.amount)
        .ok_or_else(|| overflow(&from.id))
}

/// Convert a held amount into a debit on `from` and a credit on `to`.
pub(crate) fn settle_hold(
    from: &Account,
    to: &Account,
    record: &TransactionRecord,
    at: DateTime<Utc>,
) -> Result<Posting, LedgerStoreError> {
    if !record.reserved {
        return Err(LedgerStoreError::invalid_state(format!(
            "transaction {} has no reservation",
            record.id
        )));
    }
    ensure_settleable(to, record)?;

    let amount = record.amount;
    let from_balance = from
        .balance
        .checked_sub(amount)
        .ok_or_else(|| overflow(&from.id))?;
    let from_reserved = from
        .reserved
        .checked_sub(amount)
        .ok_or_else(|| overflow(&from.id))?;
    let to_balance = to
        .balance
        .checked_add(amount)
        .ok_or_else(|| overflow(&to.id))?;
    let debit = amount.checked_neg().ok_or_else(|| overflow(&from.id))?;

    let entry = |account_id, kind, delta| LedgerEntry {
        id: EntryId::random(),
        account_id,
        transaction_id: Some(record.id),
        kind,
        delta,
        created_at: at,
    };
    Ok(Posting {
        from_balance,
        from_reserved,
        to_balance,
        debit: entry(from.id, EntryKind::Debit, debit),
        credit: entry(to.id, EntryKind::Credit, amount),
    })
}

/// New `reserved` figure for the source once any hold is dropped.
pub(crate) fn release_hold(
    from: &Account,
    record: &TransactionRecord,
) -> Result<Amount, LedgerStoreError> {
    if !record.reserved {
        return Ok(from.reserved);
    }
    from.reserved
        .checked_sub(record.amount)
        .ok_or_else(|| overflow(&from.id))
}
