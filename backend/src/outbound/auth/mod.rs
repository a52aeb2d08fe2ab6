//! Bearer token verification against the identity provider's key material.

mod jwks;

pub use jwks::{ClaimRules, JwksTokenVerifier};
