//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driving ports (`*Command`, `*Query`) are implemented by domain services
//! and called by inbound adapters. Driven ports ([`LedgerStore`],
//! [`TokenVerifier`]) are implemented by outbound adapters.

mod macros;
pub(crate) use macros::define_port_error;

mod account_command;
mod account_query;
mod ledger_store;
mod token_verifier;
mod transfer_command;
mod transfer_query;

#[cfg(test)]
pub use account_command::MockAccountCommand;
pub use account_command::{AccountCommand, CreateAccountRequest};
#[cfg(test)]
pub use account_query::MockAccountQuery;
pub use account_query::AccountQuery;
#[cfg(test)]
pub use ledger_store::MockLedgerStore;
pub use ledger_store::{LedgerStore, LedgerStoreError};
#[cfg(test)]
pub use token_verifier::MockTokenVerifier;
pub use token_verifier::{FixtureTokenVerifier, TokenVerificationError, TokenVerifier};
#[cfg(test)]
pub use transfer_command::MockTransferCommand;
pub use transfer_command::{TransferCommand, TransferOutcome, TransferRequest};
#[cfg(test)]
pub use transfer_query::MockTransferQuery;
pub use transfer_query::TransferQuery;
