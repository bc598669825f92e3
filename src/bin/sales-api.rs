//! The sales service.
//!
//! ```text
//! SALES_DB_HOST=db:5432 sales-api --web-api-host 0.0.0.0:3000
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use garrison::auth::{Auth, KeyRing};
use garrison::config::Config;
use garrison::handlers::{self, StatusCheck, TcpStatusCheck};
use garrison::{Server, Shutdown};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cfg = Config::parse();
    info!(config = ?cfg, version = env!("CARGO_PKG_VERSION"), "startup");

    let public_pem = std::fs::read(&cfg.auth.public_key_file)
        .with_context(|| format!("reading public key {}", cfg.auth.public_key_file.display()))?;
    let key_ring = KeyRing::new()
        .with_rsa_pem(cfg.auth.key_id.clone(), &public_pem)
        .context("parsing public key")?;
    let auth = Auth::new(&cfg.auth.algorithm, key_ring).context("constructing auth")?;

    let db: Arc<dyn StatusCheck> = Arc::new(TcpStatusCheck::new(cfg.db.host.clone(), cfg.db.check_timeout));

    let shutdown = Shutdown::new();
    let app = handlers::api(shutdown.clone(), Arc::new(auth), db);

    Server::bind(cfg.web.api_host)
        .shutdown(shutdown)
        .request_timeout(cfg.web.request_timeout)
        .grace_period(cfg.web.shutdown_timeout)
        .serve(app)
        .await
        .context("serving api")?;

    info!("shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
