//! Account HTTP handlers.
//!
//! ```text
//! POST /api/v1/accounts
//! GET  /api/v1/accounts/{id}
//! GET  /api/v1/accounts/{id}/balance
//! GET  /api/v1/accounts/{id}/entries
//! ```

use actix_web::{HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::domain::ports::CreateAccountRequest;
use crate::domain::{Account, Amount, BalanceView, Currency, Error, LedgerEntry};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::Authenticated;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation;

/// Request payload for opening an account.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateAccountBody {
    /// ISO 4217 currency code.
    #[schema(example = "USD")]
    pub currency: String,
    /// Initial funding in minor units; elevated principals only.
    #[schema(example = 100_000)]
    pub opening_balance: Option<i64>,
}

/// Account representation returned by the API.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: String,
    pub owner: String,
    pub currency: String,
    /// Settled balance in minor units.
    pub balance: i64,
    /// Funds held by in-flight transfers.
    pub reserved: i64,
    pub available: i64,
    #[schema(example = "active")]
    pub status: String,
    pub version: i64,
    pub created_at: String,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id.to_string(),
            owner: account.owner.to_string(),
            currency: account.currency.to_string(),
            balance: account.balance.minor_units(),
            reserved: account.reserved.minor_units(),
            available: account.available().minor_units(),
            status: account.status.to_string(),
            version: account.version,
            created_at: account.created_at.to_rfc3339(),
        }
    }
}

/// Balance snapshot.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub account_id: String,
    pub currency: String,
    pub balance: i64,
    pub available: i64,
}

impl From<BalanceView> for BalanceResponse {
    fn from(view: BalanceView) -> Self {
        Self {
            account_id: view.account_id.to_string(),
            currency: view.currency.to_string(),
            balance: view.balance.minor_units(),
            available: view.available.minor_units(),
        }
    }
}

/// One ledger movement.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryResponse {
    pub id: String,
    pub account_id: String,
    pub transaction_id: Option<String>,
    #[schema(example = "debit")]
    pub kind: String,
    /// Signed change in minor units.
    pub delta: i64,
    pub created_at: String,
}

impl From<LedgerEntry> for LedgerEntryResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            account_id: entry.account_id.to_string(),
            transaction_id: entry.transaction_id.map(|id| id.to_string()),
            kind: entry.kind.as_str().to_owned(),
            delta: entry.delta.minor_units(),
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

fn parse_create_account(body: CreateAccountBody) -> Result<CreateAccountRequest, Error> {
    let currency = Currency::new(&body.currency).map_err(|err| {
        Error::invalid_request(err.to_string()).with_details(json!({
            "field": "currency",
            "value": body.currency,
        }))
    })?;
    Ok(CreateAccountRequest {
        currency,
        opening_balance: body.opening_balance.map(Amount::new),
    })
}

/// Open an account owned by the caller.
#[utoipa::path(
    post,
    path = "/api/v1/accounts",
    request_body = CreateAccountBody,
    responses(
        (status = 201, description = "Account opened", body = AccountResponse),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Opening balance needs the elevated role", body = ErrorSchema),
        (status = 422, description = "Invalid request", body = ErrorSchema),
        (status = 503, description = "Ledger store unavailable", body = ErrorSchema)
    ),
    tags = ["accounts"],
    operation_id = "createAccount"
)]
#[post("/accounts")]
pub async fn create_account(
    state: web::Data<HttpState>,
    auth: Authenticated,
    payload: web::Json<CreateAccountBody>,
) -> ApiResult<HttpResponse> {
    let request = parse_create_account(payload.into_inner())?;
    let account = state
        .accounts
        .create_account(auth.principal(), request)
        .await?;
    Ok(HttpResponse::Created().json(AccountResponse::from(account)))
}

/// Fetch an account.
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{id}",
    params(("id" = String, Path, description = "Account identifier")),
    responses(
        (status = 200, description = "Account", body = AccountResponse),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Not the account owner", body = ErrorSchema),
        (status = 404, description = "Unknown account", body = ErrorSchema)
    ),
    tags = ["accounts"],
    operation_id = "getAccount"
)]
#[get("/accounts/{id}")]
pub async fn get_account(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<String>,
) -> ApiResult<web::Json<AccountResponse>> {
    let id = validation::account_id(&path)?;
    let account = state
        .accounts_query
        .get_account(auth.principal(), &id)
        .await?;
    Ok(web::Json(account.into()))
}

/// Current and available balance.
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{id}/balance",
    params(("id" = String, Path, description = "Account identifier")),
    responses(
        (status = 200, description = "Balance", body = BalanceResponse),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Not the account owner", body = ErrorSchema),
        (status = 404, description = "Unknown account", body = ErrorSchema)
    ),
    tags = ["accounts"],
    operation_id = "getBalance"
)]
#[get("/accounts/{id}/balance")]
pub async fn get_balance(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<String>,
) -> ApiResult<web::Json<BalanceResponse>> {
    let id = validation::account_id(&path)?;
    let view = state
        .accounts_query
        .get_balance(auth.principal(), &id)
        .await?;
    Ok(web::Json(view.into()))
}

/// Ledger entries in write order.
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{id}/entries",
    params(("id" = String, Path, description = "Account identifier")),
    responses(
        (status = 200, description = "Ledger entries", body = [LedgerEntryResponse]),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Not the account owner", body = ErrorSchema),
        (status = 404, description = "Unknown account", body = ErrorSchema)
    ),
    tags = ["accounts"],
    operation_id = "listEntries"
)]
#[get("/accounts/{id}/entries")]
pub async fn list_entries(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<String>,
) -> ApiResult<web::Json<Vec<LedgerEntryResponse>>> {
    let id = validation::account_id(&path)?;
    let entries = state
        .accounts_query
        .list_entries(auth.principal(), &id)
        .await?;
    Ok(web::Json(entries.into_iter().map(Into::into).collect()))
}

/// Register the account handlers on an API scope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(create_account)
        .service(get_account)
        .service(get_balance)
        .service(list_entries);
}
