//! Transfer service implementing idempotent fund movement.
//!
//! A transfer is recorded as `Pending` before any funds are touched, then
//! settled through the ledger store's reserve and commit primitives. A crash
//! or cancellation between those steps leaves the record `Pending`; the next
//! request with the same key, or the [`crate::domain::PendingTransferResolver`],
//! finishes it.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde_json::json;
use tracing::{info, warn};

use crate::domain::ports::{
    LedgerStore, LedgerStoreError, TransferCommand, TransferOutcome, TransferQuery,
    TransferRequest,
};
use crate::domain::settlement::{Settled, failure_error, map_ledger_error, settle};
use crate::domain::{
    AccessPolicy, Account, AccountId, Error, PayloadHash, Principal, TransactionId,
    TransactionRecord, TransactionStatus, canonicalize_and_hash,
};

/// Hash identifying the economic content of a transfer request.
///
/// The idempotency key itself is excluded: it selects the record, the hash
/// decides whether the request matches it.
pub fn transfer_payload_hash(request: &TransferRequest) -> Result<PayloadHash, Error> {
    let payload = json!({
        "fromId": request.from_id.to_string(),
        "toId": request.to_id.to_string(),
        "amount": request.amount.minor_units(),
        "currency": request.currency.as_ref(),
    });
    canonicalize_and_hash(&payload)
        .map_err(|err| Error::internal(format!("failed to hash transfer payload: {err}")))
}

/// Moves funds between accounts exactly once per idempotency key.
pub struct TransferService<S: ?Sized> {
    store: Arc<S>,
    policy: AccessPolicy,
    clock: Arc<dyn Clock>,
}

impl<S: ?Sized> TransferService<S> {
    /// Build the service over a ledger store.
    pub fn new(store: Arc<S>, policy: AccessPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            policy,
            clock,
        }
    }
}

fn validate_shape(request: &TransferRequest) -> Result<(), Error> {
    if request.from_id == request.to_id {
        return Err(Error::invalid_request(
            "source and destination accounts must differ",
        ));
    }
    if !request.amount.is_positive() {
        return Err(Error::invalid_request("amount must be greater than zero")
            .with_details(json!({ "field": "amount" })));
    }
    Ok(())
}

fn check_account(account: &Account, request: &TransferRequest, role: &str) -> Result<(), Error> {
    if account.currency != request.currency {
        return Err(Error::invalid_request(format!(
            "{role} account {} uses {}, not {}",
            account.id, account.currency, request.currency
        ))
        .with_details(json!({ "field": "currency" })));
    }
    if !account.is_active() {
        return Err(Error::invalid_request(format!(
            "{role} account {} is inactive",
            account.id
        )));
    }
    Ok(())
}

impl<S> TransferService<S>
where
    S: LedgerStore + ?Sized,
{
    async fn load_account(&self, id: &AccountId, role: &str) -> Result<Account, Error> {
        self.store
            .find_account(id)
            .await
            .map_err(map_ledger_error)?
            .ok_or_else(|| Error::not_found(format!("{role} account {id} not found")))
    }

    async fn authorise_new_transfer(
        &self,
        principal: &Principal,
        request: &TransferRequest,
    ) -> Result<(), Error> {
        let from = self.load_account(&request.from_id, "source").await?;
        let to = self.load_account(&request.to_id, "destination").await?;
        check_account(&from, request, "source")?;
        check_account(&to, request, "destination")?;
        if !self.policy.can_access_account(principal, &from) {
            return Err(Error::forbidden(
                "principal may not debit the source account",
            ));
        }
        Ok(())
    }

    async fn settle_record(&self, id: &TransactionId) -> Result<TransactionRecord, Error> {
        let settled = settle(self.store.as_ref(), id, self.clock.utc())
            .await
            .map_err(map_ledger_error)?;
        match settled {
            Settled::Committed(record) => {
                info!(
                    transaction_id = %record.id,
                    from_id = %record.from_id,
                    to_id = %record.to_id,
                    amount = record.amount.minor_units(),
                    "transfer committed"
                );
                Ok(record)
            }
            Settled::Failed(record) => {
                warn!(
                    transaction_id = %record.id,
                    reason = ?record.failure_reason,
                    "transfer failed"
                );
                Err(failure_error(&record))
            }
        }
    }

    async fn replay(
        &self,
        existing: TransactionRecord,
        payload_hash: &PayloadHash,
    ) -> Result<TransferOutcome, Error> {
        if existing.payload_hash != *payload_hash {
            return Err(Error::conflict(
                "idempotency key already used with a different payload",
            )
            .with_details(json!({ "transactionId": existing.id.to_string() })));
        }
        match existing.status {
            TransactionStatus::Committed => {
                info!(transaction_id = %existing.id, "replaying committed transfer");
                Ok(TransferOutcome {
                    record: existing,
                    replayed: true,
                })
            }
            TransactionStatus::Failed => Err(failure_error(&existing)),
            TransactionStatus::Pending => {
                info!(transaction_id = %existing.id, "resuming pending transfer");
                let record = self.settle_record(&existing.id).await?;
                Ok(TransferOutcome {
                    record,
                    replayed: true,
                })
            }
        }
    }
}

#[async_trait]
impl<S> TransferCommand for TransferService<S>
where
    S: LedgerStore + ?Sized,
{
    async fn transfer(
        &self,
        principal: &Principal,
        request: TransferRequest,
    ) -> Result<TransferOutcome, Error> {
        validate_shape(&request)?;
        let payload_hash = transfer_payload_hash(&request)?;

        let existing = self
            .store
            .find_transaction_by_key(principal.subject(), &request.idempotency_key)
            .await
            .map_err(map_ledger_error)?;
        if let Some(existing) = existing {
            return self.replay(existing, &payload_hash).await;
        }

        self.authorise_new_transfer(principal, &request).await?;

        let now = self.clock.utc();
        let record = TransactionRecord {
            id: TransactionId::random(),
            initiator: principal.subject().clone(),
            from_id: request.from_id,
            to_id: request.to_id,
            amount: request.amount,
            currency: request.currency,
            status: TransactionStatus::Pending,
            idempotency_key: request.idempotency_key,
            payload_hash,
            reserved: false,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        };

        match self.store.begin_transfer(&record).await {
            Ok(()) => {}
            Err(LedgerStoreError::DuplicateKey { .. }) => {
                let winner = self
                    .store
                    .find_transaction_by_key(&record.initiator, &record.idempotency_key)
                    .await
                    .map_err(map_ledger_error)?
                    .ok_or_else(|| {
                        Error::internal("idempotency record disappeared during race resolution")
                    })?;
                return self.replay(winner, &record.payload_hash).await;
            }
            Err(other) => return Err(map_ledger_error(other)),
        }

        info!(
            transaction_id = %record.id,
            initiator = %record.initiator,
            idempotency_key = %record.idempotency_key,
            "transfer recorded as pending"
        );
        let record = self.settle_record(&record.id).await?;
        Ok(TransferOutcome {
            record,
            replayed: false,
        })
    }
}

#[async_trait]
impl<S> TransferQuery for TransferService<S>
where
    S: LedgerStore + ?Sized,
{
    async fn get_transfer(
        &self,
        principal: &Principal,
        id: &TransactionId,
    ) -> Result<TransactionRecord, Error> {
        let record = self
            .store
            .find_transaction(id)
            .await
            .map_err(map_ledger_error)?
            .ok_or_else(|| Error::not_found(format!("transfer {id} not found")))?;

        if record.initiator == *principal.subject() || self.policy.is_elevated(principal) {
            return Ok(record);
        }

        let mut owners = Vec::with_capacity(2);
        for account_id in [&record.from_id, &record.to_id] {
            if let Some(account) = self
                .store
                .find_account(account_id)
                .await
                .map_err(map_ledger_error)?
            {
                owners.push(account.owner);
            }
        }
        let owner_refs: Vec<_> = owners.iter().collect();
        if self.policy.can_view_transfer(principal, &record, &owner_refs) {
            Ok(record)
        } else {
            Err(Error::forbidden("transfer is not visible to this principal"))
        }
    }
}

#[cfg(test)]
#[path = "transfer_service_tests.rs"]
mod tests;
