//! Market Pulse service binary entrypoint.
//! Boots the Axum HTTP server over the shared fetch core.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use market_pulse::config::FeedConfig;
use market_pulse::fetch::ReqwestTransport;
use market_pulse::metrics::Metrics;

/// Compact logs by default, JSON lines when `LOG_FORMAT=json`.
/// `try_init` leaves an already installed subscriber alone.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,fetch=info,news=info"));
    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        // Host runtime already owns the global subscriber.
        tracing::debug!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = match FeedConfig::load_default() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %format!("{e:#}"), "feed config not loaded; using defaults");
            FeedConfig::from_env()
        }
    };

    // Recorder first, so series registered while wiring services are kept.
    let metrics = match Metrics::init(cfg.cache.ttl().as_millis() as u64) {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(error = %format!("{e:#}"), "metrics disabled");
            None
        }
    };

    let transport = ReqwestTransport::new(&cfg.http)
        .map_err(|e| shuttle_runtime::Error::Custom(e.context("building http client")))?;
    let mut router = market_pulse::app(&cfg, Arc::new(transport)).await;
    if let Some(m) = metrics {
        router = router.merge(m.router());
    }

    info!(key_present = cfg.api_key.is_some(), "market-pulse listening");
    Ok(router.into())
}
