//! Server construction, dependency wiring and background recovery.

mod config;

pub use config::{ServerSettings, SettingsError, VerifierSettings};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
use mockable::{Clock, DefaultClock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

#[cfg(debug_assertions)]
use crate::doc::ApiDoc;
use crate::domain::ports::{LedgerStore, TokenVerifier};
use crate::domain::{AccessPolicy, AccountService, PendingTransferResolver, TransferService};
use crate::inbound::http::auth::Authenticate;
use crate::inbound::http::health::HealthState;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{json_config, path_config};
use crate::inbound::http::{accounts, health, transfers};
use crate::middleware::Trace;
use crate::outbound::auth::JwksTokenVerifier;
use crate::outbound::ledger::InMemoryLedgerStore;
use crate::outbound::persistence::{
    DbPool, DieselLedgerStore, MigrationError, PoolConfig, PoolError, run_migrations,
};

/// Fatal conditions that stop the process before it serves traffic.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("ledger store unreachable: {message}")]
    StoreUnreachable { message: String },
    #[error("token verifier unavailable: {message}")]
    Verifier { message: String },
}

/// Everything the HTTP workers share.
#[derive(Clone)]
pub struct AppDependencies {
    pub health_state: web::Data<HealthState>,
    pub http_state: web::Data<HttpState>,
    pub verifier: Arc<dyn TokenVerifier>,
}

impl AppDependencies {
    /// Wire the account and transfer services over `store`.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        verifier: Arc<dyn TokenVerifier>,
        policy: AccessPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let accounts = Arc::new(AccountService::new(
            Arc::clone(&store),
            policy.clone(),
            Arc::clone(&clock),
        ));
        let transfers = Arc::new(TransferService::new(Arc::clone(&store), policy, clock));
        let http_state = HttpState::new(
            accounts.clone(),
            accounts,
            transfers.clone(),
            transfers,
        );
        Self {
            health_state: web::Data::new(HealthState::new(store)),
            http_state: web::Data::new(http_state),
            verifier,
        }
    }
}

/// Assemble the application: health probes outside authentication, the
/// versioned API behind it, and Swagger UI in debug builds.
pub fn build_app(
    deps: AppDependencies,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let AppDependencies {
        health_state,
        http_state,
        verifier,
    } = deps;

    let api = web::scope("/api/v1")
        .wrap(Authenticate::new(verifier))
        .configure(accounts::configure)
        .configure(transfers::configure);

    let app = App::new()
        .app_data(health_state)
        .app_data(http_state)
        .app_data(json_config())
        .app_data(path_config())
        .wrap(Trace)
        .configure(health::configure)
        .service(api);

    #[cfg(debug_assertions)]
    let app = app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

    app
}

/// Bind the listener and start the workers.
///
/// Readiness is flipped once the socket is bound.
///
/// # Errors
///
/// Propagates [`std::io::Error`] when binding the socket fails.
pub fn create_server(deps: AppDependencies, bind_addr: SocketAddr) -> std::io::Result<Server> {
    let health_state = deps.health_state.clone();
    let server = HttpServer::new(move || build_app(deps.clone()))
        .bind(bind_addr)?
        .run();
    health_state.mark_ready();
    info!(%bind_addr, "listening");
    Ok(server)
}

/// Open the ledger store named by the settings.
///
/// With a database URL, migrations are applied and the pool must answer a
/// ping; otherwise the in-memory ledger is used.
///
/// # Errors
///
/// Any database failure is fatal at startup.
pub async fn build_store(settings: &ServerSettings) -> Result<Arc<dyn LedgerStore>, StartupError> {
    let Some(url) = settings.database_url() else {
        warn!("no database configured; balances live in memory and are lost on exit");
        return Ok(Arc::new(InMemoryLedgerStore::new()));
    };

    run_migrations(&url).await?;
    let pool = DbPool::new(
        PoolConfig::new(url.as_str()).with_max_size(settings.db_max_connections),
    )
    .await?;
    let store = DieselLedgerStore::new(pool);
    store
        .ping()
        .await
        .map_err(|err| StartupError::StoreUnreachable {
            message: err.to_string(),
        })?;
    info!(max_connections = settings.db_max_connections, "connected to ledger database");
    Ok(Arc::new(store))
}

/// Build the bearer-token verifier named by the settings.
///
/// A JWKS verifier fetches the provider's keys once up front so a
/// misconfigured URL is caught before serving traffic.
///
/// # Errors
///
/// Fails when no verifier is configured or the key source is unreachable.
pub async fn build_verifier(
    settings: &ServerSettings,
) -> Result<Arc<dyn TokenVerifier>, StartupError> {
    match settings.verifier()? {
        VerifierSettings::Jwks { url, rules } => {
            let verifier = JwksTokenVerifier::remote(
                url.clone(),
                rules,
                settings.jwks_timeout(),
                settings.jwks_refresh(),
            )
            .map_err(|err| StartupError::Verifier {
                message: err.to_string(),
            })?;
            let keys = verifier
                .warm_up()
                .await
                .map_err(|err| StartupError::Verifier {
                    message: err.to_string(),
                })?;
            info!(%url, keys, "identity provider keys loaded");
            Ok(Arc::new(verifier))
        }
        VerifierSettings::SharedSecret { secret, rules } => {
            warn!("accepting HS256 tokens signed with the development secret");
            Ok(Arc::new(JwksTokenVerifier::shared_secret(&secret, rules)))
        }
    }
}

/// Settle pending transfers left by a previous process, then keep
/// re-driving stale ones on an interval.
///
/// The startup pass uses no grace period: nothing pending can belong to a
/// request in this process yet.
pub fn spawn_recovery(
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    grace: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    let resolver = PendingTransferResolver::new(store, clock);
    tokio::spawn(async move {
        if let Err(err) = resolver.resolve_pending(Duration::ZERO).await {
            error!(error = %err, "startup recovery pass failed");
        }
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(err) = resolver.resolve_pending(grace).await {
                warn!(error = %err, "recovery pass failed");
            }
        }
    })
}

/// Resolve every collaborator from `settings` and start the server.
///
/// # Errors
///
/// Returns [`StartupError`] for configuration or dependency failures and
/// wraps bind failures as [`std::io::Error`].
pub async fn start(settings: &ServerSettings) -> std::io::Result<(Server, JoinHandle<()>)> {
    let to_io = |err: StartupError| std::io::Error::other(err.to_string());
    let bind_addr = settings.bind_addr().map_err(StartupError::from).map_err(to_io)?;
    let store = build_store(settings).await.map_err(to_io)?;
    let verifier = build_verifier(settings).await.map_err(to_io)?;
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);

    let recovery = spawn_recovery(
        Arc::clone(&store),
        Arc::clone(&clock),
        settings.recovery_grace(),
        settings.recovery_interval(),
    );
    let deps = AppDependencies::new(
        store,
        verifier,
        AccessPolicy::new(settings.elevated_role()),
        clock,
    );
    let server = create_server(deps, bind_addr)?;
    Ok((server, recovery))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::FixtureTokenVerifier;
    use crate::domain::{LedgerEntry, OpenedAccount};
    use crate::test_support::{account, fixture_clock, fixture_timestamp, pending_record};
    use actix_web::http::StatusCode;
    use actix_web::test;
    use rstest::rstest;

    fn deps(store: Arc<InMemoryLedgerStore>) -> AppDependencies {
        AppDependencies::new(
            store,
            Arc::new(FixtureTokenVerifier::default()),
            AccessPolicy::default(),
            fixture_clock(),
        )
    }

    #[rstest]
    #[actix_web::test]
    async fn health_is_public_and_api_requires_a_token() {
        let app = test::init_service(build_app(deps(Arc::new(InMemoryLedgerStore::new())))).await;

        let health = test::call_service(&app, test::TestRequest::get().uri("/health").to_request())
            .await;
        assert_eq!(health.status(), StatusCode::OK);
        assert!(health.headers().contains_key(crate::domain::TRACE_ID_HEADER));

        let api = test::call_service(
            &app,
            test::TestRequest::post().uri("/api/v1/accounts").to_request(),
        )
        .await;
        assert_eq!(api.status(), StatusCode::UNAUTHORIZED);
        assert!(api.headers().contains_key(crate::domain::TRACE_ID_HEADER));
    }

    #[rstest]
    #[tokio::test]
    async fn startup_recovery_settles_leftover_pending_transfers() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let from = account("alice", 1_000);
        let to = account("bob", 0);
        let opening = LedgerEntry::opening(from.id, from.balance, fixture_timestamp());
        store
            .insert_account(&OpenedAccount {
                account: from.clone(),
                opening_entry: Some(opening),
            })
            .await
            .expect("seed source");
        store
            .insert_account(&OpenedAccount {
                account: to.clone(),
                opening_entry: None,
            })
            .await
            .expect("seed destination");
        let mut record = pending_record("alice", from.id, to.id, 400);
        record.created_at = fixture_timestamp() - chrono::Duration::minutes(5);
        record.updated_at = record.created_at;
        store
            .begin_transfer(&record)
            .await
            .expect("seed pending transfer");

        let handle = spawn_recovery(
            store.clone(),
            fixture_clock(),
            Duration::from_secs(30),
            Duration::from_secs(3_600),
        );
        let mut settled = None;
        for _ in 0..50 {
            let current = store.find_transaction(&record.id).await.expect("lookup");
            if current.as_ref().is_some_and(|r| r.is_terminal()) {
                settled = current;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        let settled = settled.expect("recovery settled the transfer");
        assert_eq!(settled.status, crate::domain::TransactionStatus::Committed);
        let balance = store
            .find_account(&to.id)
            .await
            .expect("lookup")
            .expect("destination exists")
            .balance;
        assert_eq!(balance.minor_units(), 400);
    }

    #[rstest]
    #[tokio::test]
    async fn missing_verifier_configuration_is_fatal() {
        let settings = ServerSettings {
            bind_addr: None,
            database_url: None,
            db_max_connections: 10,
            jwks_url: None,
            jwt_issuer: None,
            jwt_audience: None,
            dev_jwt_secret: None,
            elevated_role: None,
            recovery_grace_secs: 30,
            recovery_interval_secs: 15,
            jwks_timeout_secs: 5,
            jwks_refresh_secs: 60,
        };

        let err = build_verifier(&settings).await.err().expect("no verifier");
        assert!(matches!(
            err,
            StartupError::Settings(SettingsError::MissingVerifier)
        ));
    }
}
