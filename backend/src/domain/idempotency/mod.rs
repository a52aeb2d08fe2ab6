//! Idempotency primitives for safe transfer retries.
//!
//! - [`IdempotencyKey`]: opaque client token supplied with each transfer.
//! - [`PayloadHash`]: SHA-256 of the canonical transfer payload, used to
//!   detect a key reused for a different request.
//!
//! # Payload canonicalisation
//!
//! Object keys are sorted recursively and the value is serialised to compact
//! JSON before hashing, so key order and whitespace never affect the hash.

mod key;
mod payload;

pub use key::{IDEMPOTENCY_KEY_MAX, IdempotencyKey, IdempotencyKeyValidationError};
pub use payload::{PayloadHash, PayloadHashError, canonicalize_and_hash};
