//! Driven port that turns a bearer token into a verified [`Principal`].

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::Principal;

use super::define_port_error;

define_port_error! {
    /// Errors raised while verifying bearer tokens.
    pub enum TokenVerificationError {
        /// The token could not be decoded.
        Malformed { message: String } => "malformed token: {message}",
        /// Signature, expiry, issuer or audience checks failed.
        Rejected { message: String } => "token rejected: {message}",
        /// Verification keys could not be obtained.
        KeySource { message: String } => "verification keys unavailable: {message}",
    }
}

/// Verifies bearer tokens issued by the identity provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Validate `token` and return the principal it identifies.
    async fn verify(&self, token: &str) -> Result<Principal, TokenVerificationError>;
}

/// Verifier backed by a fixed token table. Intended for tests.
#[derive(Debug, Default, Clone)]
pub struct FixtureTokenVerifier {
    tokens: HashMap<String, Principal>,
}

impl FixtureTokenVerifier {
    /// Accept `token` as `principal`.
    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(token.into(), principal);
        self
    }
}

#[async_trait]
impl TokenVerifier for FixtureTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Principal, TokenVerificationError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| TokenVerificationError::rejected("unknown token"))
    }
}
