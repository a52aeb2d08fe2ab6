//! Request validation shared by the HTTP handlers.
//!
//! Body and path extraction failures are rewritten into domain
//! `InvalidRequest` errors so clients always receive the JSON error envelope.

use std::str::FromStr;

use actix_web::error::{JsonPayloadError, PathError};
use actix_web::{HttpRequest, web};
use serde_json::json;
use tracing::debug;

use crate::domain::{AccountId, Error, TransactionId};

/// JSON extractor configuration mapping parse failures to `InvalidRequest`.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(16 * 1024)
        .error_handler(|err: JsonPayloadError, req: &HttpRequest| {
            debug!(path = req.path(), error = %err, "rejected request body");
            let detail = match &err {
                JsonPayloadError::ContentType => "expected application/json".to_owned(),
                JsonPayloadError::Overflow { .. }
                | JsonPayloadError::OverflowKnownLength { .. } => {
                    "request body too large".to_owned()
                }
                other => other.to_string(),
            };
            Error::invalid_request("malformed request body")
                .with_details(json!({ "reason": detail }))
                .into()
        })
}

/// Path extractor configuration mapping parse failures to `InvalidRequest`.
pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err: PathError, _req: &HttpRequest| {
        Error::invalid_request("malformed path parameter")
            .with_details(json!({ "reason": err.to_string() }))
            .into()
    })
}

fn parse_id<T: FromStr>(raw: &str, kind: &str) -> Result<T, Error> {
    raw.parse()
        .map_err(|_| Error::not_found(format!("{kind} {raw} not found")))
}

/// Parse an account id from a path segment.
///
/// Identifiers that are not UUIDs cannot name an existing account, so they
/// are reported as not found.
pub(crate) fn account_id(raw: &str) -> Result<AccountId, Error> {
    parse_id(raw, "account")
}

/// Parse a transaction id from a path segment.
pub(crate) fn transaction_id(raw: &str) -> Result<TransactionId, Error> {
    parse_id(raw, "transfer")
}
