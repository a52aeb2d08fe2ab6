//! Test helpers for inbound HTTP components.

use std::sync::Arc;

use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::http::header::AUTHORIZATION;
use actix_web::{App, web};

use crate::domain::ports::{
    FixtureTokenVerifier, MockAccountCommand, MockAccountQuery, MockTransferCommand,
    MockTransferQuery,
};
use crate::domain::{Principal, SubjectId};
use crate::inbound::http::auth::Authenticate;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{json_config, path_config};

/// Token accepted for the `alice` customer.
pub const ALICE_TOKEN: &str = "t-alice";

/// The principal `ALICE_TOKEN` resolves to.
pub fn alice() -> Principal {
    Principal::new(SubjectId::new("alice").expect("subject"), ["customer"])
}

/// `Authorization` header carrying `token`.
pub fn bearer(token: &str) -> (actix_web::http::header::HeaderName, String) {
    (AUTHORIZATION, format!("Bearer {token}"))
}

/// Mocks for every driving port; tests set expectations before building
/// the state.
#[derive(Default)]
pub struct MockPorts {
    pub accounts: MockAccountCommand,
    pub accounts_query: MockAccountQuery,
    pub transfers: MockTransferCommand,
    pub transfers_query: MockTransferQuery,
}

impl MockPorts {
    pub fn into_state(self) -> HttpState {
        HttpState::new(
            Arc::new(self.accounts),
            Arc::new(self.accounts_query),
            Arc::new(self.transfers),
            Arc::new(self.transfers_query),
        )
    }
}

/// App mounting `configure` under an authenticated `/api/v1` scope.
pub fn api_app(
    state: HttpState,
    configure: fn(&mut web::ServiceConfig),
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let verifier = FixtureTokenVerifier::default().with_token(ALICE_TOKEN, alice());
    App::new()
        .app_data(web::Data::new(state))
        .app_data(json_config())
        .app_data(path_config())
        .service(
            web::scope("/api/v1")
                .wrap(Authenticate::new(Arc::new(verifier)))
                .configure(configure),
        )
}
