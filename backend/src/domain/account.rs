//! Account aggregate and its append-only ledger entries.
//!
//! ## Invariants
//! - `balance >= 0` and `0 <= reserved <= balance` at every observable point.
//! - `balance` only changes together with a matching [`LedgerEntry`], so
//!   summing an account's entries always reproduces its balance.
//! - `version` increases by one on every committed balance change.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, Amount, Currency, EntryId, SubjectId, TransactionId};

/// Lifecycle state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Accepts debits and credits.
    Active,
    /// Rejects new transfers; balance is kept for audit.
    Inactive,
}

impl AccountStatus {
    /// Stable storage representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a stored enum discriminator is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    /// Enum being parsed.
    pub kind: &'static str,
    /// Rejected input.
    pub value: String,
}

impl FromStr for AccountStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(ParseEnumError {
                kind: "account status",
                value: other.to_owned(),
            }),
        }
    }
}

/// A single-currency account holding a non-negative balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Account identifier.
    pub id: AccountId,
    /// Subject that owns the account.
    pub owner: SubjectId,
    /// Currency every movement on this account must use.
    pub currency: Currency,
    /// Settled balance in minor units.
    pub balance: Amount,
    /// Funds held by in-flight transfers.
    pub reserved: Amount,
    /// Incremented on each committed balance change.
    pub version: i64,
    /// Lifecycle state.
    pub status: AccountStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Open a new active account with a zero balance.
    pub fn open(owner: SubjectId, currency: Currency, created_at: DateTime<Utc>) -> Self {
        Self {
            id: AccountId::random(),
            owner,
            currency,
            balance: Amount::ZERO,
            reserved: Amount::ZERO,
            version: 0,
            status: AccountStatus::Active,
            created_at,
        }
    }

    /// Balance not held by pending transfers.
    ///
    /// # Examples
    /// ```
    /// use banksystem::domain::{Account, Amount, Currency, SubjectId};
    /// use chrono::Utc;
    ///
    /// let mut account = Account::open(
    ///     SubjectId::new("alice").expect("subject"),
    ///     Currency::new("USD").expect("currency"),
    ///     Utc::now(),
    /// );
    /// account.balance = Amount::new(1_000);
    /// account.reserved = Amount::new(300);
    /// assert_eq!(account.available(), Amount::new(700));
    /// ```
    pub fn available(&self) -> Amount {
        Amount::new(
            self.balance
                .minor_units()
                .saturating_sub(self.reserved.minor_units()),
        )
    }

    /// True when the account may take part in transfers.
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

/// Why a ledger entry was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Initial funding recorded when the account was opened.
    Opening,
    /// Funds leaving the account through a transfer.
    Debit,
    /// Funds arriving through a transfer.
    Credit,
}

impl EntryKind {
    /// Stable storage representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }
}

impl FromStr for EntryKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "opening" => Ok(Self::Opening),
            "debit" => Ok(Self::Debit),
            "credit" => Ok(Self::Credit),
            other => Err(ParseEnumError {
                kind: "entry kind",
                value: other.to_owned(),
            }),
        }
    }
}

/// Append-only balance movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// Entry identifier.
    pub id: EntryId,
    /// Account whose balance moved.
    pub account_id: AccountId,
    /// Transfer that produced the entry; absent for opening entries.
    pub transaction_id: Option<TransactionId>,
    /// Entry category.
    pub kind: EntryKind,
    /// Signed balance change: negative for debits.
    pub delta: Amount,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Opening entry funding a new account.
    pub fn opening(account_id: AccountId, amount: Amount, created_at: DateTime<Utc>) -> Self {
        Self {
            id: EntryId::random(),
            account_id,
            transaction_id: None,
            kind: EntryKind::Opening,
            delta: amount,
            created_at,
        }
    }
}

/// A new account together with its optional opening entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedAccount {
    /// The account to persist; its balance already includes the opening entry.
    pub account: Account,
    /// Funding entry when the account opens with a non-zero balance.
    pub opening_entry: Option<LedgerEntry>,
}

/// Sum ledger deltas; `None` on overflow.
///
/// Used by audits: the replayed total must equal the stored balance.
///
/// # Examples
/// ```
/// use banksystem::domain::{AccountId, Amount, LedgerEntry, replay_balance};
/// use chrono::Utc;
///
/// let id = AccountId::random();
/// let entries = vec![LedgerEntry::opening(id, Amount::new(1_000), Utc::now())];
/// assert_eq!(replay_balance(&entries), Some(Amount::new(1_000)));
/// ```
pub fn replay_balance(entries: &[LedgerEntry]) -> Option<Amount> {
    entries
        .iter()
        .try_fold(Amount::ZERO, |total, entry| total.checked_add(entry.delta))
}

/// Balance projection returned to account holders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    /// Account the balance belongs to.
    pub account_id: AccountId,
    /// Account currency.
    pub currency: Currency,
    /// Settled balance.
    pub balance: Amount,
    /// Balance minus outstanding holds.
    pub available: Amount,
}

impl From<&Account> for BalanceView {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.id,
            currency: account.currency.clone(),
            balance: account.balance,
            available: account.available(),
        }
    }
}
