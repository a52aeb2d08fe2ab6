//! Shared HTTP adapter state.
//!
//! Handlers receive this through `web::Data` and only see driving ports, so
//! they can be exercised with mocks and no I/O.

use std::sync::Arc;

use crate::domain::ports::{AccountCommand, AccountQuery, TransferCommand, TransferQuery};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub accounts: Arc<dyn AccountCommand>,
    pub accounts_query: Arc<dyn AccountQuery>,
    pub transfers: Arc<dyn TransferCommand>,
    pub transfers_query: Arc<dyn TransferQuery>,
}

impl HttpState {
    /// Bundle the account and transfer use cases.
    pub fn new(
        accounts: Arc<dyn AccountCommand>,
        accounts_query: Arc<dyn AccountQuery>,
        transfers: Arc<dyn TransferCommand>,
        transfers_query: Arc<dyn TransferQuery>,
    ) -> Self {
        Self {
            accounts,
            accounts_query,
            transfers,
            transfers_query,
        }
    }
}
