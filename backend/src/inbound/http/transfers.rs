//! Transfer HTTP handlers.
//!
//! ```text
//! POST /api/v1/transfers
//! GET  /api/v1/transfers/{id}
//! ```
//!
//! Each transfer runs on its own task so a client disconnect cannot cancel
//! it between reserving and committing funds.

use std::str::FromStr;
use std::sync::Arc;

use actix_web::{HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;
use utoipa::ToSchema;

use crate::domain::ports::{TransferOutcome, TransferRequest};
use crate::domain::{
    AccountId, Amount, Currency, Error, IdempotencyKey, TraceId, TransactionRecord,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::Authenticated;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation;

/// Header set to `true` when the response replays an earlier outcome.
pub const IDEMPOTENT_REPLAYED_HEADER: &str = "Idempotent-Replayed";

/// Transfer request body.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransferBody {
    pub from_id: String,
    pub to_id: String,
    /// Positive amount in minor units.
    #[schema(example = 300)]
    pub amount: i64,
    #[schema(example = "USD")]
    pub currency: String,
    /// Client-chosen key; retries must reuse it.
    #[schema(example = "9b7e1c1a-transfer-1")]
    pub idempotency_key: String,
}

/// Transaction record representation.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub id: String,
    pub initiator: String,
    pub from_id: String,
    pub to_id: String,
    pub amount: i64,
    pub currency: String,
    #[schema(example = "committed")]
    pub status: String,
    pub idempotency_key: String,
    #[schema(example = "insufficient_funds")]
    pub failure_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<TransactionRecord> for TransferResponse {
    fn from(record: TransactionRecord) -> Self {
        Self {
            id: record.id.to_string(),
            initiator: record.initiator.to_string(),
            from_id: record.from_id.to_string(),
            to_id: record.to_id.to_string(),
            amount: record.amount.minor_units(),
            currency: record.currency.to_string(),
            status: record.status.to_string(),
            idempotency_key: record.idempotency_key.to_string(),
            failure_reason: record
                .failure_reason
                .map(|reason| reason.as_str().to_owned()),
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

fn invalid_field(field: &str, value: &str, message: impl Into<String>) -> Error {
    Error::invalid_request(message).with_details(json!({
        "field": field,
        "value": value,
    }))
}

fn parse_account_field(field: &str, raw: &str) -> Result<AccountId, Error> {
    AccountId::from_str(raw)
        .map_err(|_| invalid_field(field, raw, format!("{field} must be an account UUID")))
}

fn parse_transfer(body: TransferBody) -> Result<TransferRequest, Error> {
    let from_id = parse_account_field("fromId", &body.from_id)?;
    let to_id = parse_account_field("toId", &body.to_id)?;
    let currency = Currency::new(&body.currency)
        .map_err(|err| invalid_field("currency", &body.currency, err.to_string()))?;
    let idempotency_key = IdempotencyKey::new(body.idempotency_key.as_str()).map_err(|err| {
        invalid_field("idempotencyKey", &body.idempotency_key, err.to_string())
    })?;
    Ok(TransferRequest {
        from_id,
        to_id,
        amount: Amount::new(body.amount),
        currency,
        idempotency_key,
    })
}

/// Run the transfer on a detached task that outlives the request.
async fn run_detached(
    state: &HttpState,
    auth: Authenticated,
    request: TransferRequest,
) -> ApiResult<TransferOutcome> {
    let transfers = Arc::clone(&state.transfers);
    let Authenticated(principal) = auth;
    let work = async move { transfers.transfer(&principal, request).await };
    let handle = match TraceId::current() {
        Some(trace_id) => tokio::spawn(TraceId::scope(trace_id, work)),
        None => tokio::spawn(work),
    };
    handle.await.map_err(|err| {
        error!(error = %err, "transfer task did not complete");
        Error::internal("transfer task did not complete")
    })?
}

/// Move funds between two accounts exactly once per idempotency key.
#[utoipa::path(
    post,
    path = "/api/v1/transfers",
    request_body = TransferBody,
    responses(
        (
            status = 200,
            description = "Transfer committed, or the recorded outcome of an earlier request",
            headers((
                "Idempotent-Replayed" = String,
                description = "Present and `true` when the outcome was replayed"
            )),
            body = TransferResponse
        ),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Caller does not own the source account", body = ErrorSchema),
        (status = 404, description = "Unknown account", body = ErrorSchema),
        (status = 409, description = "Key reused for another payload", body = ErrorSchema),
        (status = 422, description = "Invalid request or insufficient funds", body = ErrorSchema),
        (status = 503, description = "Store unavailable; retry the same key", body = ErrorSchema)
    ),
    tags = ["transfers"],
    operation_id = "createTransfer"
)]
#[post("/transfers")]
pub async fn create_transfer(
    state: web::Data<HttpState>,
    auth: Authenticated,
    payload: web::Json<TransferBody>,
) -> ApiResult<HttpResponse> {
    let request = parse_transfer(payload.into_inner())?;
    let outcome = run_detached(&state, auth, request).await?;

    let mut response = HttpResponse::Ok();
    if outcome.replayed {
        response.insert_header((IDEMPOTENT_REPLAYED_HEADER, "true"));
    }
    Ok(response.json(TransferResponse::from(outcome.record)))
}

/// Fetch a transfer by id.
#[utoipa::path(
    get,
    path = "/api/v1/transfers/{id}",
    params(("id" = String, Path, description = "Transaction identifier")),
    responses(
        (status = 200, description = "Transaction record", body = TransferResponse),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Caller is not a party to the transfer", body = ErrorSchema),
        (status = 404, description = "Unknown transfer", body = ErrorSchema)
    ),
    tags = ["transfers"],
    operation_id = "getTransfer"
)]
#[get("/transfers/{id}")]
pub async fn get_transfer(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<String>,
) -> ApiResult<web::Json<TransferResponse>> {
    let id = validation::transaction_id(&path)?;
    let record = state
        .transfers_query
        .get_transfer(auth.principal(), &id)
        .await?;
    Ok(web::Json(record.into()))
}

/// Register the transfer handlers on an API scope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(create_transfer).service(get_transfer);
}

#[cfg(test)]
#[path = "transfers_tests.rs"]
mod tests;
