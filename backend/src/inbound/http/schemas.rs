//! OpenAPI schema wrappers for domain types.
//!
//! Domain types do not derive `ToSchema`; these mirrors register the error
//! envelope with utoipa from inside the adapter layer.

use utoipa::ToSchema;

/// OpenAPI schema for [`crate::domain::ErrorCode`].
#[derive(ToSchema)]
#[schema(as = crate::domain::ErrorCode)]
pub enum ErrorCodeSchema {
    /// The request is malformed or fails validation.
    #[schema(rename = "invalid_request")]
    InvalidRequest,
    /// Authentication failed or is missing.
    #[schema(rename = "unauthorized")]
    Unauthorized,
    /// Authenticated but not permitted to perform this action.
    #[schema(rename = "forbidden")]
    Forbidden,
    /// The requested resource does not exist.
    #[schema(rename = "not_found")]
    NotFound,
    /// The source account cannot cover the transfer.
    #[schema(rename = "insufficient_funds")]
    InsufficientFunds,
    /// The idempotency key was reused with a different payload.
    #[schema(rename = "conflict")]
    Conflict,
    /// The ledger store or identity provider is unavailable; retry with the
    /// same idempotency key.
    #[schema(rename = "service_unavailable")]
    ServiceUnavailable,
    /// An unexpected error occurred on the server.
    #[schema(rename = "internal_error")]
    InternalError,
}

/// OpenAPI schema for [`crate::domain::Error`].
#[derive(ToSchema)]
#[schema(as = crate::domain::Error)]
#[schema(rename_all = "camelCase")]
#[expect(
    dead_code,
    reason = "Used only for OpenAPI schema generation via utoipa"
)]
pub struct ErrorSchema {
    /// Stable machine-readable error code.
    #[schema(example = "insufficient_funds")]
    code: ErrorCodeSchema,
    /// Human-readable message returned to clients.
    #[schema(example = "account balance too low")]
    message: String,
    /// Correlation identifier matching the `trace-id` response header.
    #[schema(example = "3f2c8a9e-5b1d-4c7e-9a0f-6d2b1e8c4a7f")]
    trace_id: Option<String>,
    /// Supplementary error details for clients.
    details: Option<serde_json::Value>,
}
