//! Driving port for idempotent transfers between accounts.

use async_trait::async_trait;

use crate::domain::{
    AccountId, Amount, Currency, Error, IdempotencyKey, Principal, TransactionRecord,
};

/// Transfer request after transport-level parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Account to debit.
    pub from_id: AccountId,
    /// Account to credit.
    pub to_id: AccountId,
    /// Strictly positive amount in minor units.
    pub amount: Amount,
    /// Must match both accounts' currency.
    pub currency: Currency,
    /// Client deduplication token, scoped to the initiator.
    pub idempotency_key: IdempotencyKey,
}

/// Result of a transfer call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// The committed transaction.
    pub record: TransactionRecord,
    /// True when the record was produced by an earlier call with the same key.
    pub replayed: bool,
}

/// Transfer write operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransferCommand: Send + Sync {
    /// Move funds exactly once per `(principal, idempotency key)`.
    ///
    /// Repeating a request returns the original outcome: the committed record
    /// (flagged as replayed) or the original failure. Reusing a key with a
    /// different payload fails with `Conflict`.
    async fn transfer(
        &self,
        principal: &Principal,
        request: TransferRequest,
    ) -> Result<TransferOutcome, Error>;
}
