//! Driving port for reading accounts, balances and their audit trail.

use async_trait::async_trait;

use crate::domain::{Account, AccountId, BalanceView, Error, LedgerEntry, Principal};

/// Account read operations.
///
/// Every method returns `NotFound` for unknown ids and `Forbidden` when the
/// principal neither owns the account nor holds the elevated role.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountQuery: Send + Sync {
    /// Load an account.
    async fn get_account(&self, principal: &Principal, id: &AccountId) -> Result<Account, Error>;

    /// Current balance and available funds.
    async fn get_balance(
        &self,
        principal: &Principal,
        id: &AccountId,
    ) -> Result<BalanceView, Error>;

    /// Ledger entries in insertion order.
    async fn list_entries(
        &self,
        principal: &Principal,
        id: &AccountId,
    ) -> Result<Vec<LedgerEntry>, Error>;
}
