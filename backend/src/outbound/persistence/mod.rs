//! PostgreSQL persistence for the ledger using Diesel.
//!
//! Row structs (`models.rs`) and table definitions (`schema.rs`) stay private
//! to this module; only [`DieselLedgerStore`] and the pool types are exposed.
//! Connections come from a `bb8` pool through `diesel-async`.
//!
//! # Example
//!
//! ```ignore
//! use banksystem::outbound::persistence::{DbPool, DieselLedgerStore, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/ledger")).await?;
//! let store = DieselLedgerStore::new(pool);
//! ```

mod diesel_ledger_store;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_ledger_store::DieselLedgerStore;
pub use migrations::{MigrationError, run_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
