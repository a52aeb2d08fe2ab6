//! Server settings loaded via OrthoConfig.
//!
//! Every field can be supplied as a `BANK_*` environment variable, a command
//! line flag or a configuration file entry.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;
use zeroize::Zeroizing;

use crate::domain::DEFAULT_ELEVATED_ROLE;
use crate::outbound::auth::ClaimRules;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:1323";

/// Configuration problems detected before any listener is bound.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid bind address {value:?}: {message}")]
    BindAddr { value: String, message: String },
    #[error("invalid JWKS URL {value:?}: {message}")]
    JwksUrl { value: String, message: String },
    #[error("no token verifier configured: set BANK_JWKS_URL or BANK_DEV_JWT_SECRET")]
    MissingVerifier,
}

/// Where bearer tokens are verified.
pub enum VerifierSettings {
    /// Keys published by the identity provider.
    Jwks { url: Url, rules: ClaimRules },
    /// HS256 shared secret for development.
    SharedSecret {
        secret: Zeroizing<Vec<u8>>,
        rules: ClaimRules,
    },
}

/// Process-wide settings for the HTTP server.
#[derive(Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "BANK")]
pub struct ServerSettings {
    /// Socket address to listen on.
    pub bind_addr: Option<String>,
    /// PostgreSQL URL; the in-memory ledger is used when unset.
    pub database_url: Option<String>,
    #[ortho_config(default = 10)]
    pub db_max_connections: u32,
    /// Identity provider JWKS endpoint.
    pub jwks_url: Option<String>,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,
    /// HS256 secret accepted instead of JWKS keys. Development only.
    pub dev_jwt_secret: Option<String>,
    /// Role granting access to every account.
    pub elevated_role: Option<String>,
    /// Age a pending transfer must reach before recovery re-drives it.
    #[ortho_config(default = 30)]
    pub recovery_grace_secs: u64,
    #[ortho_config(default = 15)]
    pub recovery_interval_secs: u64,
    /// Timeout for JWKS fetches.
    #[ortho_config(default = 5)]
    pub jwks_timeout_secs: u64,
    /// Minimum spacing between JWKS refetches triggered by unknown key ids.
    #[ortho_config(default = 60)]
    pub jwks_refresh_secs: u64,
}

impl fmt::Debug for ServerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerSettings")
            .field("bind_addr", &self.bind_addr)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("db_max_connections", &self.db_max_connections)
            .field("jwks_url", &self.jwks_url)
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_audience", &self.jwt_audience)
            .field("dev_jwt_secret", &self.dev_jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("elevated_role", &self.elevated_role)
            .field("recovery_grace_secs", &self.recovery_grace_secs)
            .field("recovery_interval_secs", &self.recovery_interval_secs)
            .field("jwks_timeout_secs", &self.jwks_timeout_secs)
            .field("jwks_refresh_secs", &self.jwks_refresh_secs)
            .finish()
    }
}

impl ServerSettings {
    /// Listening address, defaulting to `0.0.0.0:1323`.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let raw = self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        raw.parse().map_err(|err: std::net::AddrParseError| SettingsError::BindAddr {
            value: raw.to_owned(),
            message: err.to_string(),
        })
    }

    /// Database URL wrapped so it is wiped when dropped.
    pub fn database_url(&self) -> Option<Zeroizing<String>> {
        self.database_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .map(|url| Zeroizing::new(url.to_owned()))
    }

    pub fn elevated_role(&self) -> &str {
        self.elevated_role
            .as_deref()
            .filter(|role| !role.trim().is_empty())
            .unwrap_or(DEFAULT_ELEVATED_ROLE)
    }

    pub fn recovery_grace(&self) -> Duration {
        Duration::from_secs(self.recovery_grace_secs)
    }

    pub fn recovery_interval(&self) -> Duration {
        Duration::from_secs(self.recovery_interval_secs.max(1))
    }

    pub fn jwks_timeout(&self) -> Duration {
        Duration::from_secs(self.jwks_timeout_secs.max(1))
    }

    pub fn jwks_refresh(&self) -> Duration {
        Duration::from_secs(self.jwks_refresh_secs)
    }

    fn claim_rules(&self) -> ClaimRules {
        ClaimRules {
            issuer: self.jwt_issuer.clone(),
            audience: self.jwt_audience.clone(),
        }
    }

    /// Token verification source. A JWKS URL wins over a shared secret.
    pub fn verifier(&self) -> Result<VerifierSettings, SettingsError> {
        if let Some(raw) = self.jwks_url.as_deref() {
            let url = Url::parse(raw).map_err(|err| SettingsError::JwksUrl {
                value: raw.to_owned(),
                message: err.to_string(),
            })?;
            return Ok(VerifierSettings::Jwks {
                url,
                rules: self.claim_rules(),
            });
        }
        match self.dev_jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => Ok(VerifierSettings::SharedSecret {
                secret: Zeroizing::new(secret.as_bytes().to_vec()),
                rules: self.claim_rules(),
            }),
            _ => Err(SettingsError::MissingVerifier),
        }
    }
}
