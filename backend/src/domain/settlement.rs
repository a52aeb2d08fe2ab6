//! Drives a pending transaction to a terminal state.
//!
//! Shared by the transfer service and the pending-transfer resolver so a
//! retried request and the background sweep settle records identically.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::domain::ports::{LedgerStore, LedgerStoreError};
use crate::domain::{Error, FailureReason, TransactionId, TransactionRecord, TransactionStatus};

/// Terminal state reached by [`settle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Settled {
    /// Funds moved.
    Committed(TransactionRecord),
    /// Transfer abandoned; the record carries the failure reason.
    Failed(TransactionRecord),
}

/// Reserve then commit `id`, rolling back when the source cannot pay.
///
/// Another task finishing the same record first is not an error: the stored
/// terminal state is returned instead. Connection and query failures leave
/// the record `Pending` for the resolver.
pub(crate) async fn settle<S>(
    store: &S,
    id: &TransactionId,
    at: DateTime<Utc>,
) -> Result<Settled, LedgerStoreError>
where
    S: LedgerStore + ?Sized,
{
    let handle = match store.reserve(id).await {
        Ok(handle) => handle,
        Err(LedgerStoreError::InsufficientFunds { message }) => {
            debug!(transaction_id = %id, %message, "reservation refused");
            return fail(store, id, FailureReason::InsufficientFunds, at).await;
        }
        Err(LedgerStoreError::AccountUnavailable { message }) => {
            debug!(transaction_id = %id, %message, "account unavailable at reservation");
            return fail(store, id, FailureReason::AccountUnavailable, at).await;
        }
        Err(LedgerStoreError::BalanceOverflow { message }) => {
            debug!(transaction_id = %id, %message, "credit refused at reservation");
            return fail(store, id, FailureReason::BalanceOverflow, at).await;
        }
        Err(LedgerStoreError::InvalidState { .. }) => return current_state(store, id).await,
        Err(other) => return Err(other),
    };

    match store.commit(&handle, at).await {
        Ok(record) => Ok(Settled::Committed(record)),
        Err(LedgerStoreError::AccountUnavailable { message }) => {
            warn!(transaction_id = %id, %message, "account unavailable at commit");
            fail(store, id, FailureReason::AccountUnavailable, at).await
        }
        Err(LedgerStoreError::BalanceOverflow { message }) => {
            warn!(transaction_id = %id, %message, "credit refused at commit");
            fail(store, id, FailureReason::BalanceOverflow, at).await
        }
        Err(LedgerStoreError::InvalidState { .. }) => current_state(store, id).await,
        Err(other) => Err(other),
    }
}

async fn fail<S>(
    store: &S,
    id: &TransactionId,
    reason: FailureReason,
    at: DateTime<Utc>,
) -> Result<Settled, LedgerStoreError>
where
    S: LedgerStore + ?Sized,
{
    match store.rollback(id, reason, at).await {
        Ok(record) => Ok(Settled::Failed(record)),
        Err(LedgerStoreError::InvalidState { .. }) => current_state(store, id).await,
        Err(other) => Err(other),
    }
}

async fn current_state<S>(store: &S, id: &TransactionId) -> Result<Settled, LedgerStoreError>
where
    S: LedgerStore + ?Sized,
{
    let record = store
        .find_transaction(id)
        .await?
        .ok_or_else(|| LedgerStoreError::not_found(format!("transaction {id}")))?;
    match record.status {
        TransactionStatus::Committed => Ok(Settled::Committed(record)),
        TransactionStatus::Failed => Ok(Settled::Failed(record)),
        TransactionStatus::Pending => Err(LedgerStoreError::invalid_state(format!(
            "transaction {id} still pending after concurrent settlement"
        ))),
    }
}

/// Error returned to the caller for a `Failed` record.
pub(crate) fn failure_error(record: &TransactionRecord) -> Error {
    let details = serde_json::json!({ "transactionId": record.id.to_string() });
    match record.failure_reason {
        Some(FailureReason::AccountUnavailable) => Error::invalid_request(
            "transfer failed: an account is inactive or uses another currency",
        )
        .with_details(details),
        Some(FailureReason::BalanceOverflow) => Error::invalid_request(
            "transfer failed: the destination balance cannot hold the amount",
        )
        .with_details(details),
        Some(FailureReason::InsufficientFunds) | None => {
            Error::insufficient_funds("insufficient funds in source account").with_details(details)
        }
    }
}

/// Map ledger store failures onto domain errors.
pub(crate) fn map_ledger_error(error: LedgerStoreError) -> Error {
    match error {
        LedgerStoreError::Connection { message } => {
            Error::service_unavailable(format!("ledger store unavailable: {message}"))
        }
        LedgerStoreError::NotFound { message } => Error::not_found(message),
        LedgerStoreError::InsufficientFunds { .. } => {
            Error::insufficient_funds("insufficient funds in source account")
        }
        LedgerStoreError::DuplicateKey { message } => {
            Error::conflict(format!("idempotency key already used: {message}"))
        }
        LedgerStoreError::AccountUnavailable { message } => {
            Error::invalid_request(format!("account unavailable: {message}"))
        }
        LedgerStoreError::BalanceOverflow { message } => {
            Error::invalid_request(format!("balance overflow: {message}"))
        }
        LedgerStoreError::Query { message } | LedgerStoreError::InvalidState { message } => {
            Error::internal(format!("ledger store error: {message}"))
        }
    }
}

#[cfg(test)]
#[path = "settlement_tests.rs"]
mod tests;
