//! Transfer transactions and the reservation handle linking reserve to commit.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::account::ParseEnumError;
use super::{AccountId, Amount, Currency, IdempotencyKey, PayloadHash, SubjectId, TransactionId};

/// Transfer lifecycle. `Committed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Recorded but not yet settled.
    Pending,
    /// Both ledger entries written.
    Committed,
    /// Abandoned without moving funds.
    Failed,
}

impl TransactionStatus {
    /// Stable storage representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Committed => "committed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "committed" => Ok(Self::Committed),
            "failed" => Ok(Self::Failed),
            other => Err(ParseEnumError {
                kind: "transaction status",
                value: other.to_owned(),
            }),
        }
    }
}

/// Why a transfer ended in [`TransactionStatus::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Source available balance was below the amount.
    InsufficientFunds,
    /// An account was missing, inactive, or in another currency at settlement.
    AccountUnavailable,
    /// The credit would overflow the destination balance.
    BalanceOverflow,
}

impl FailureReason {
    /// Stable storage representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InsufficientFunds => "insufficient_funds",
            Self::AccountUnavailable => "account_unavailable",
            Self::BalanceOverflow => "balance_overflow",
        }
    }
}

impl FromStr for FailureReason {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insufficient_funds" => Ok(Self::InsufficientFunds),
            "account_unavailable" => Ok(Self::AccountUnavailable),
            "balance_overflow" => Ok(Self::BalanceOverflow),
            other => Err(ParseEnumError {
                kind: "failure reason",
                value: other.to_owned(),
            }),
        }
    }
}

/// Persistent record of one transfer attempt.
///
/// The `(initiator, idempotency_key)` pair is unique across all records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    /// Transaction identifier.
    pub id: TransactionId,
    /// Principal that requested the transfer.
    pub initiator: SubjectId,
    /// Source account.
    pub from_id: AccountId,
    /// Destination account.
    pub to_id: AccountId,
    /// Strictly positive amount.
    pub amount: Amount,
    /// Currency shared by both accounts.
    pub currency: Currency,
    /// Lifecycle state.
    pub status: TransactionStatus,
    /// Client-supplied deduplication key.
    pub idempotency_key: IdempotencyKey,
    /// Hash of the canonical request payload.
    pub payload_hash: PayloadHash,
    /// Whether a hold is currently placed on the source account.
    pub reserved: bool,
    /// Set once the record is `Failed`.
    pub failure_reason: Option<FailureReason>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last state change.
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// True once the record can no longer change.
    pub fn is_terminal(&self) -> bool {
        self.status != TransactionStatus::Pending
    }
}

/// Proof that funds are held for a pending transaction.
///
/// Only [`crate::domain::ports::LedgerStore::reserve`] produces handles;
/// commit consumes one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationHandle {
    /// Transaction the hold belongs to.
    pub transaction_id: TransactionId,
    /// Account carrying the hold.
    pub account_id: AccountId,
    /// Held amount.
    pub amount: Amount,
}

impl ReservationHandle {
    /// Handle describing the hold `record` places on its source account.
    #[must_use]
    pub fn for_record(record: &TransactionRecord) -> Self {
        Self {
            transaction_id: record.id,
            account_id: record.from_id,
            amount: record.amount,
        }
    }
}
