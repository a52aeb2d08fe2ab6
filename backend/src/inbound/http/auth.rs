//! Bearer-token authentication for the API scope.
//!
//! [`Authenticate`] verifies the `Authorization: Bearer` header before any
//! handler runs and stores the resulting [`Principal`] in the request
//! extensions. Handlers read it back through the [`Authenticated`] extractor.

use std::future::{Ready, ready};
use std::rc::Rc;
use std::sync::Arc;

use actix_web::body::EitherBody;
use actix_web::dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::http::header::AUTHORIZATION;
use actix_web::{FromRequest, HttpMessage, HttpRequest, ResponseError};
use futures_util::future::LocalBoxFuture;
use tracing::{debug, warn};

use crate::domain::ports::{TokenVerificationError, TokenVerifier};
use crate::domain::{Error, Principal};

/// Middleware factory rejecting requests without a valid bearer token.
#[derive(Clone)]
pub struct Authenticate {
    verifier: Arc<dyn TokenVerifier>,
}

impl Authenticate {
    /// Authenticate requests with `verifier`.
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { verifier }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authenticate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = AuthenticateMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthenticateMiddleware {
            service: Rc::new(service),
            verifier: Arc::clone(&self.verifier),
        }))
    }
}

/// Service wrapper produced by [`Authenticate`].
pub struct AuthenticateMiddleware<S> {
    service: Rc<S>,
    verifier: Arc<dyn TokenVerifier>,
}

impl<S, B> Service<ServiceRequest> for AuthenticateMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let verifier = Arc::clone(&self.verifier);
        Box::pin(async move {
            let token = match bearer_token(req.request()) {
                Ok(token) => token,
                Err(err) => {
                    debug!(path = req.path(), reason = err.message(), "request not authenticated");
                    return Ok(reject(req, &err));
                }
            };
            match verifier.verify(&token).await {
                Ok(principal) => {
                    debug!(subject = %principal.subject(), "request authenticated");
                    req.extensions_mut().insert(principal);
                    service
                        .call(req)
                        .await
                        .map(ServiceResponse::map_into_left_body)
                }
                Err(err) => {
                    warn!(path = req.path(), error = %err, "bearer token refused");
                    Ok(reject(req, &verification_error(&err)))
                }
            }
        })
    }
}

fn reject<B>(req: ServiceRequest, error: &Error) -> ServiceResponse<EitherBody<B>> {
    req.into_response(error.error_response()).map_into_right_body()
}

/// Extract the token from `Authorization: Bearer <token>`.
fn bearer_token(req: &HttpRequest) -> Result<String, Error> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| Error::unauthorized("missing bearer token"))?;
    let value = header
        .to_str()
        .map_err(|_| Error::unauthorized("malformed authorization header"))?;
    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| Error::unauthorized("malformed authorization header"))?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(Error::unauthorized("malformed authorization header"));
    }
    Ok(token.to_owned())
}

fn verification_error(error: &TokenVerificationError) -> Error {
    match error {
        TokenVerificationError::KeySource { .. } => {
            Error::service_unavailable("identity provider unavailable")
        }
        TokenVerificationError::Malformed { .. } | TokenVerificationError::Rejected { .. } => {
            Error::unauthorized("invalid bearer token")
        }
    }
}

/// The principal attached by [`Authenticate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated(pub Principal);

impl Authenticated {
    /// Borrow the verified principal.
    pub fn principal(&self) -> &Principal {
        &self.0
    }
}

impl FromRequest for Authenticated {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Principal>()
                .cloned()
                .map(Self)
                .ok_or_else(|| Error::unauthorized("authentication required")),
        )
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
