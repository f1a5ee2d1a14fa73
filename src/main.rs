//! KimpBot - Kimchi Premium & Cross-Exchange Gap Aggregator
//!
//! Composition root: every service is constructed here and injected
//! explicitly; there are no module-level singletons.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use kimpbot_backend::{
    api::{create_router, AppState},
    arbitrage::{ArbitrageEngine, FeeModel},
    connectors::{self, upbit::UpbitClient, QuoteService},
    enrichment::{EnrichmentService, InMemoryAddressBook, StaticNetworkTable},
    fx::{FxRateService, UpbitFxSource},
    models::Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let quotes = Arc::new(QuoteService::new(
        connectors::default_connectors()?,
        Duration::from_millis(config.quote_cache_ttl_ms),
    ));

    let fx = Arc::new(FxRateService::new(
        Arc::new(UpbitFxSource::new(UpbitClient::new()?)),
        Duration::from_millis(config.fx_live_ttl_ms),
        Duration::from_millis(config.fx_fallback_ttl_ms),
    ));

    let arbitrage = Arc::new(ArbitrageEngine::new(FeeModel::from_config(&config)));

    let enrichment = Arc::new(EnrichmentService::new(
        Arc::new(StaticNetworkTable::with_defaults(&quotes.exchanges())),
        Arc::new(InMemoryAddressBook::from_env()),
    ));

    let state = AppState {
        quotes,
        fx,
        arbitrage,
        enrichment,
    };

    let app = create_router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("🚀 kimpbot listening on {}", addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
