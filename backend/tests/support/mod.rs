//! Shared harness for the HTTP integration suites.

use std::sync::Arc;

use actix_web::http::header::{AUTHORIZATION, HeaderName};
use banksystem::domain::AccessPolicy;
use banksystem::domain::ports::TokenVerifier;
use banksystem::outbound::auth::{ClaimRules, JwksTokenVerifier};
use banksystem::outbound::ledger::InMemoryLedgerStore;
use banksystem::server::AppDependencies;
use jsonwebtoken::{EncodingKey, Header, encode, get_current_timestamp};
use mockable::DefaultClock;
use serde_json::json;

pub const SECRET: &[u8] = b"integration-test-secret";
pub const ADMIN_ROLE: &str = "bank-admin";

/// Sign an HS256 access token for `subject` holding `roles`.
pub fn token(subject: &str, roles: &[&str]) -> String {
    let claims = json!({
        "sub": subject,
        "exp": get_current_timestamp() + 600,
        "realm_access": { "roles": roles },
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET),
    )
    .expect("sign token")
}

pub fn bearer(token: &str) -> (HeaderName, String) {
    (AUTHORIZATION, format!("Bearer {token}"))
}

/// Dependencies over a fresh in-memory ledger and the shared-secret verifier.
pub fn in_memory_deps() -> (Arc<InMemoryLedgerStore>, AppDependencies) {
    let store = Arc::new(InMemoryLedgerStore::new());
    let verifier: Arc<dyn TokenVerifier> =
        Arc::new(JwksTokenVerifier::shared_secret(SECRET, ClaimRules::default()));
    let deps = AppDependencies::new(
        store.clone(),
        verifier,
        AccessPolicy::new(ADMIN_ROLE),
        Arc::new(DefaultClock),
    );
    (store, deps)
}
