//! `TokenVerifier` backed by `jsonwebtoken`.
//!
//! Production deployments point the verifier at the provider's JWKS URL.
//! Keys are cached by `kid`; a token naming an unknown `kid` triggers at
//! most one refetch per refresh interval. A shared-secret variant accepts
//! HS256 tokens for development and tests.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::jwk::{AlgorithmParameters, JwkSet, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::ports::{TokenVerificationError, TokenVerifier};
use crate::domain::{Principal, SubjectId};

/// Issuer and audience the token must carry, when configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimRules {
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl ClaimRules {
    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyFamily {
    Rsa,
    Ec,
}

impl KeyFamily {
    fn accepts(self, algorithm: Algorithm) -> bool {
        match self {
            Self::Rsa => matches!(
                algorithm,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ),
            Self::Ec => matches!(algorithm, Algorithm::ES256 | Algorithm::ES384),
        }
    }
}

#[derive(Clone)]
struct VerificationKey {
    key: DecodingKey,
    family: KeyFamily,
}

#[derive(Default)]
struct KeyCache {
    keys: HashMap<String, VerificationKey>,
    attempted_at: Option<Instant>,
    last_error: Option<TokenVerificationError>,
}

struct RemoteKeys {
    client: Client,
    url: Url,
    refresh_interval: Duration,
    cache: RwLock<KeyCache>,
    // Serialises refetches; cached lookups never wait on it.
    refresh: Mutex<()>,
}

impl RemoteKeys {
    fn new(client: Client, url: Url, refresh_interval: Duration) -> Self {
        Self {
            client,
            url,
            refresh_interval,
            cache: RwLock::new(KeyCache::default()),
            refresh: Mutex::new(()),
        }
    }

    async fn cached(&self, kid: &str) -> Option<VerificationKey> {
        self.cache.read().await.keys.get(kid).cloned()
    }

    async fn key_for(&self, kid: &str) -> Result<VerificationKey, TokenVerificationError> {
        if let Some(key) = self.cached(kid).await {
            return Ok(key);
        }

        let _refresh = self.refresh.lock().await;
        if let Some(key) = self.cached(kid).await {
            return Ok(key);
        }
        {
            let cache = self.cache.read().await;
            let recently_attempted = cache
                .attempted_at
                .is_some_and(|at| at.elapsed() < self.refresh_interval);
            if recently_attempted {
                return Err(cache.last_error.clone().unwrap_or_else(|| {
                    TokenVerificationError::rejected(format!("unknown key id {kid}"))
                }));
            }
        }

        self.refetch().await?;
        self.cached(kid)
            .await
            .ok_or_else(|| TokenVerificationError::rejected(format!("unknown key id {kid}")))
    }

    /// Replace the cached key set. The attempt is stamped before the request
    /// goes out, so an unreachable provider is retried at most once per
    /// refresh interval.
    async fn refetch(&self) -> Result<usize, TokenVerificationError> {
        self.cache.write().await.attempted_at = Some(Instant::now());
        let fetched = self.fetch().await;
        let mut cache = self.cache.write().await;
        match fetched {
            Ok(keys) => {
                let count = keys.len();
                cache.keys = keys;
                cache.last_error = None;
                Ok(count)
            }
            Err(err) => {
                cache.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    async fn fetch(&self) -> Result<HashMap<String, VerificationKey>, TokenVerificationError> {
        let response = self
            .client
            .get(self.url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| TokenVerificationError::key_source(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TokenVerificationError::key_source(format!(
                "JWKS endpoint returned status {}",
                status.as_u16()
            )));
        }
        let set: JwkSet = response
            .json()
            .await
            .map_err(|err| TokenVerificationError::key_source(format!("invalid JWKS: {err}")))?;
        let keys = key_map(&set);
        info!(url = %self.url, keys = keys.len(), "fetched identity provider keys");
        Ok(keys)
    }
}

/// Index signing keys by `kid`, keeping only asymmetric signature keys.
fn key_map(set: &JwkSet) -> HashMap<String, VerificationKey> {
    set.keys
        .iter()
        .filter_map(|jwk| {
            let kid = jwk.common.key_id.clone()?;
            if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
                return None;
            }
            let family = match &jwk.algorithm {
                AlgorithmParameters::RSA(_) => KeyFamily::Rsa,
                AlgorithmParameters::EllipticCurve(_) => KeyFamily::Ec,
                _ => {
                    debug!(%kid, "ignoring non-asymmetric JWK");
                    return None;
                }
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => Some((kid, VerificationKey { key, family })),
                Err(err) => {
                    warn!(%kid, error = %err, "skipping unusable JWK");
                    None
                }
            }
        })
        .collect()
}

enum KeySource {
    Shared(DecodingKey),
    Remote(RemoteKeys),
}

#[derive(Debug, Deserialize)]
struct RealmAccess {
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    realm_access: Option<RealmAccess>,
    #[serde(default)]
    roles: Vec<String>,
}

impl Claims {
    fn into_principal(self) -> Result<Principal, TokenVerificationError> {
        let subject = SubjectId::new(self.sub)
            .map_err(|err| TokenVerificationError::rejected(format!("invalid subject: {err}")))?;
        let realm_roles = self.realm_access.map(|realm| realm.roles).unwrap_or_default();
        Ok(Principal::new(
            subject,
            realm_roles.into_iter().chain(self.roles),
        ))
    }
}

fn map_jwt_error(error: JwtError) -> TokenVerificationError {
    match error.kind() {
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_) => TokenVerificationError::malformed(error.to_string()),
        _ => TokenVerificationError::rejected(error.to_string()),
    }
}

/// Verifies JWT bearer tokens and maps their claims onto a [`Principal`].
pub struct JwksTokenVerifier {
    keys: KeySource,
    rules: ClaimRules,
}

impl JwksTokenVerifier {
    /// Verifier accepting HS256 tokens signed with `secret`.
    pub fn shared_secret(secret: &[u8], rules: ClaimRules) -> Self {
        Self {
            keys: KeySource::Shared(DecodingKey::from_secret(secret)),
            rules,
        }
    }

    /// Verifier fetching keys from the provider's JWKS endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn remote(
        url: Url,
        rules: ClaimRules,
        timeout: Duration,
        refresh_interval: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            keys: KeySource::Remote(RemoteKeys::new(client, url, refresh_interval)),
            rules,
        })
    }

    /// Populate the key cache ahead of the first request.
    ///
    /// Returns the number of usable keys; shared-secret verifiers report one.
    pub async fn warm_up(&self) -> Result<usize, TokenVerificationError> {
        match &self.keys {
            KeySource::Shared(_) => Ok(1),
            KeySource::Remote(remote) => {
                let _refresh = remote.refresh.lock().await;
                remote.refetch().await
            }
        }
    }
}

#[async_trait]
impl TokenVerifier for JwksTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Principal, TokenVerificationError> {
        let header = decode_header(token).map_err(map_jwt_error)?;
        let key = match &self.keys {
            KeySource::Shared(key) => {
                if header.alg != Algorithm::HS256 {
                    return Err(TokenVerificationError::rejected(format!(
                        "unexpected algorithm {:?}",
                        header.alg
                    )));
                }
                key.clone()
            }
            KeySource::Remote(remote) => {
                let kid = header
                    .kid
                    .as_deref()
                    .ok_or_else(|| TokenVerificationError::rejected("token has no key id"))?;
                let verification = remote.key_for(kid).await?;
                if !verification.family.accepts(header.alg) {
                    return Err(TokenVerificationError::rejected(format!(
                        "algorithm {:?} does not match key {kid}",
                        header.alg
                    )));
                }
                verification.key
            }
        };

        let data = decode::<Claims>(token, &key, &self.rules.validation(header.alg))
            .map_err(map_jwt_error)?;
        data.claims.into_principal()
    }
}

#[cfg(test)]
#[path = "jwks_tests.rs"]
mod tests;
