//! In-process ledger store used by tests and database-less deployments, plus
//! the balance rules every store backend applies.

mod memory;
pub(crate) mod rules;

pub use memory::InMemoryLedgerStore;
