//! Driving port for reading transfer records.

use async_trait::async_trait;

use crate::domain::{Error, Principal, TransactionId, TransactionRecord};

/// Transfer read operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransferQuery: Send + Sync {
    /// Load a transfer visible to `principal`.
    ///
    /// Visible to the initiator, the owners of either account and elevated
    /// principals; anyone else receives `Forbidden`.
    async fn get_transfer(
        &self,
        principal: &Principal,
        id: &TransactionId,
    ) -> Result<TransactionRecord, Error>;
}
