//! BankSystem entry point: loads settings, wires the ledger and serves HTTP.

use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use banksystem::server::{self, ServerSettings};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = ServerSettings::load_from_iter(std::env::args_os())
        .map_err(|e| std::io::Error::other(format!("failed to load settings: {e}")))?;
    info!(settings = ?settings, "starting BankSystem");

    let (server, recovery) = server::start(&settings).await?;
    let result = server.await;
    recovery.abort();
    info!("server stopped");
    result
}
