//! Domain primitives, aggregates and services.
//!
//! Purpose: define the strongly typed ledger model and the services that
//! implement the driving ports. Nothing here knows about HTTP, SQL or JWTs.
//!
//! Public surface:
//! - Error / ErrorCode: transport-agnostic failure payload.
//! - Amount, Currency, AccountId, TransactionId, SubjectId: value types.
//! - Account, LedgerEntry, TransactionRecord: ledger aggregates.
//! - AccountService, TransferService, PendingTransferResolver: use cases.

pub mod account;
pub mod account_service;
pub mod auth;
pub mod error;
pub mod idempotency;
pub mod ids;
pub mod money;
pub mod ports;
pub mod recovery;
mod settlement;
pub mod trace_id;
pub mod transaction;
pub mod transfer_service;

pub use self::account::{
    Account, AccountStatus, BalanceView, EntryKind, LedgerEntry, OpenedAccount, ParseEnumError,
    replay_balance,
};
pub use self::account_service::AccountService;
pub use self::auth::{AccessPolicy, DEFAULT_ELEVATED_ROLE, Principal};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::idempotency::{
    IdempotencyKey, IdempotencyKeyValidationError, PayloadHash, PayloadHashError,
    canonicalize_and_hash,
};
pub use self::ids::{AccountId, EntryId, SubjectId, SubjectIdValidationError, TransactionId};
pub use self::money::{Amount, Currency, CurrencyValidationError};
pub use self::recovery::{PendingTransferResolver, RecoveryReport};
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};
pub use self::transaction::{
    FailureReason, ReservationHandle, TransactionRecord, TransactionStatus,
};
pub use self::transfer_service::{TransferService, transfer_payload_hash};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use banksystem::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<()> {
///     Err(Error::forbidden("nope"))
/// }
/// assert!(handler().is_err());
/// ```
pub type ApiResult<T> = Result<T, Error>;
