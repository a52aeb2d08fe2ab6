//! Tests for the bearer authentication middleware.

use actix_web::http::StatusCode;
use actix_web::http::header::WWW_AUTHENTICATE;
use actix_web::test as actix_test;
use actix_web::{App, HttpResponse, web};
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ErrorCode;
use crate::domain::SubjectId;
use crate::domain::ports::{FixtureTokenVerifier, MockTokenVerifier};

fn alice() -> Principal {
    Principal::new(SubjectId::new("alice").expect("subject"), ["customer"])
}

#[fixture]
fn verifier() -> Arc<dyn TokenVerifier> {
    Arc::new(FixtureTokenVerifier::default().with_token("t-alice", alice()))
}

async fn whoami(auth: Authenticated) -> HttpResponse {
    HttpResponse::Ok().body(auth.principal().subject().to_string())
}

async fn call(verifier: Arc<dyn TokenVerifier>, authorization: Option<&str>) -> ServiceResponse {
    let app = actix_test::init_service(
        App::new().service(
            web::scope("/api")
                .wrap(Authenticate::new(verifier))
                .route("/whoami", web::get().to(whoami)),
        ),
    )
    .await;
    let mut req = actix_test::TestRequest::get().uri("/api/whoami");
    if let Some(value) = authorization {
        req = req.insert_header((AUTHORIZATION, value));
    }
    actix_test::call_service(&app, req.to_request()).await
}

#[rstest]
#[case("Bearer t-alice")]
#[case("bearer t-alice")]
#[actix_web::test]
async fn valid_token_reaches_handler_with_principal(
    verifier: Arc<dyn TokenVerifier>,
    #[case] header: &str,
) {
    let res = call(verifier, Some(header)).await;

    assert_eq!(res.status(), StatusCode::OK);
    let body = actix_test::read_body(res).await;
    assert_eq!(body.as_ref(), b"alice");
}

#[rstest]
#[case(None)]
#[case(Some("Bearer"))]
#[case(Some("Bearer   "))]
#[case(Some("Basic YWxpY2U6cHc="))]
#[case(Some("Bearer t-mallory"))]
#[actix_web::test]
async fn missing_or_invalid_credentials_are_unauthorized(
    verifier: Arc<dyn TokenVerifier>,
    #[case] header: Option<&str>,
) {
    let res = call(verifier, header).await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().contains_key(WWW_AUTHENTICATE));
    let payload: Error = actix_test::read_body_json(res).await;
    assert_eq!(payload.code(), ErrorCode::Unauthorized);
}

#[rstest]
#[actix_web::test]
async fn unreachable_key_source_is_service_unavailable() {
    let mut mock = MockTokenVerifier::new();
    mock.expect_verify()
        .times(1)
        .returning(|_| Err(TokenVerificationError::key_source("connection refused")));

    let res = call(Arc::new(mock), Some("Bearer anything")).await;

    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let payload: Error = actix_test::read_body_json(res).await;
    assert_eq!(payload.code(), ErrorCode::ServiceUnavailable);
}

#[rstest]
#[actix_web::test]
async fn extractor_without_middleware_refuses_request() {
    let app =
        actix_test::init_service(App::new().route("/whoami", web::get().to(whoami))).await;

    let req = actix_test::TestRequest::get().uri("/whoami").to_request();
    let res = actix_test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[rstest]
#[case("Bearer abc.def.ghi", Some("abc.def.ghi"))]
#[case("Bearer  spaced ", Some("spaced"))]
#[case("Token abc", None)]
#[case("Bearerabc", None)]
fn bearer_token_parsing(#[case] header: &str, #[case] expected: Option<&str>) {
    let req = actix_test::TestRequest::default()
        .insert_header((AUTHORIZATION, header))
        .to_http_request();

    assert_eq!(bearer_token(&req).ok().as_deref(), expected);
}
