//! Driving port for opening accounts.

use async_trait::async_trait;

use crate::domain::{Account, Amount, Currency, Error, Principal};

/// Request to open an account owned by the calling principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAccountRequest {
    /// Currency of the new account.
    pub currency: Currency,
    /// Initial funding; only elevated principals may set it.
    pub opening_balance: Option<Amount>,
}

/// Account write operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountCommand: Send + Sync {
    /// Open an account for `principal`.
    ///
    /// Fails with `Forbidden` when a non-elevated caller supplies an opening
    /// balance and `InvalidRequest` when the opening balance is negative.
    async fn create_account(
        &self,
        principal: &Principal,
        request: CreateAccountRequest,
    ) -> Result<Account, Error>;
}
