//! Outbound adapters implementing the domain's driven ports.
//!
//! - **ledger**: in-memory `LedgerStore` and the balance rules shared by
//!   every store backend
//! - **persistence**: PostgreSQL `LedgerStore` using Diesel
//! - **auth**: bearer token verification against a JWKS or shared secret
//!
//! Adapters translate between domain types and infrastructure
//! representations. They hold no business logic.

pub mod auth;
pub mod ledger;
pub mod persistence;
