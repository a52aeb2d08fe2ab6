//! Account service implementing the account driving ports.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use tracing::info;

use crate::domain::ports::{AccountCommand, AccountQuery, CreateAccountRequest, LedgerStore};
use crate::domain::settlement::map_ledger_error;
use crate::domain::{
    AccessPolicy, Account, AccountId, BalanceView, Error, LedgerEntry, OpenedAccount, Principal,
};

/// Opens accounts and serves owner-scoped reads.
pub struct AccountService<S: ?Sized> {
    store: Arc<S>,
    policy: AccessPolicy,
    clock: Arc<dyn Clock>,
}

impl<S: ?Sized> AccountService<S> {
    /// Build the service over a ledger store.
    pub fn new(store: Arc<S>, policy: AccessPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            policy,
            clock,
        }
    }
}

impl<S> AccountService<S>
where
    S: LedgerStore + ?Sized,
{
    async fn load_authorised(
        &self,
        principal: &Principal,
        id: &AccountId,
    ) -> Result<Account, Error> {
        let account = self
            .store
            .find_account(id)
            .await
            .map_err(map_ledger_error)?
            .ok_or_else(|| Error::not_found(format!("account {id} not found")))?;
        if !self.policy.can_access_account(principal, &account) {
            return Err(Error::forbidden("account belongs to another principal"));
        }
        Ok(account)
    }
}

#[async_trait]
impl<S> AccountCommand for AccountService<S>
where
    S: LedgerStore + ?Sized,
{
    async fn create_account(
        &self,
        principal: &Principal,
        request: CreateAccountRequest,
    ) -> Result<Account, Error> {
        let now = self.clock.utc();
        let mut account = Account::open(principal.subject().clone(), request.currency, now);

        let opening_entry = match request.opening_balance {
            None => None,
            Some(amount) if amount.is_negative() => {
                return Err(Error::invalid_request("opening balance must not be negative"));
            }
            Some(_) if !self.policy.is_elevated(principal) => {
                return Err(Error::forbidden(
                    "only elevated principals may set an opening balance",
                ));
            }
            Some(amount) if amount.is_positive() => {
                account.balance = amount;
                Some(LedgerEntry::opening(account.id, amount, now))
            }
            Some(_) => None,
        };

        let opened = OpenedAccount {
            account,
            opening_entry,
        };
        self.store
            .insert_account(&opened)
            .await
            .map_err(map_ledger_error)?;

        info!(
            account_id = %opened.account.id,
            owner = %opened.account.owner,
            currency = %opened.account.currency,
            opening_balance = opened.account.balance.minor_units(),
            "account opened"
        );
        Ok(opened.account)
    }
}

#[async_trait]
impl<S> AccountQuery for AccountService<S>
where
    S: LedgerStore + ?Sized,
{
    async fn get_account(&self, principal: &Principal, id: &AccountId) -> Result<Account, Error> {
        self.load_authorised(principal, id).await
    }

    async fn get_balance(
        &self,
        principal: &Principal,
        id: &AccountId,
    ) -> Result<BalanceView, Error> {
        let account = self.load_authorised(principal, id).await?;
        Ok(BalanceView::from(&account))
    }

    async fn list_entries(
        &self,
        principal: &Principal,
        id: &AccountId,
    ) -> Result<Vec<LedgerEntry>, Error> {
        self.load_authorised(principal, id).await?;
        self.store.list_entries(id).await.map_err(map_ledger_error)
    }
}

#[cfg(test)]
#[path = "account_service_tests.rs"]
mod tests;
