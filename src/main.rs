//! Icon market service: binary entrypoint.
//! Loads settings, boots the orchestrator and serves the Axum router.

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use icon_market::metrics::Metrics;
use icon_market::Settings;

/// Compact logs by default, JSON lines when `ICON_MARKET_LOG_JSON=1`.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("icon_market=info,warn"));
    let json = std::env::var("ICON_MARKET_LOG_JSON").is_ok_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; missing file is not an error.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = Settings::load_default().context("load settings")?;
    let bind = settings.bind.clone();
    let (router, orchestrator) = icon_market::app(settings);

    // Housekeeping for files left by older versions; never blocks startup.
    let cleanup = orchestrator.clone();
    tokio::spawn(async move {
        let removed = cleanup.cleanup_legacy().await;
        info!(removed, "legacy metadata cleanup finished");
    });

    let router = match Metrics::init() {
        Ok(m) => router.merge(m.router()),
        Err(e) => {
            warn!(error = %e, "prometheus recorder not installed; /metrics disabled");
            router
        }
    };

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    info!(%bind, "icon market listening");
    axum::serve(listener, router).await.context("serve")?;
    Ok(())
}
