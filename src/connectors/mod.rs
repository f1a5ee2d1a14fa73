//! Per-venue quote connectors.
//!
//! Each connector fetches one exchange's public ticker/orderbook snapshot
//! and normalizes it into the uniform `Quote` shape. Responses are parsed
//! through typed DTOs; records with missing or invalid fields are skipped,
//! never propagated as NaN.

pub mod binance;
pub mod bithumb;
pub mod bybit;
pub mod okx;
pub mod service;
pub mod upbit;

pub use service::QuoteService;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{Exchange, Quote};
use crate::symbols;

#[async_trait]
pub trait QuoteConnector: Send + Sync {
    fn exchange(&self) -> Exchange;

    /// One fresh snapshot of every relevant market on the venue.
    async fn fetch_quotes(&self) -> Result<Vec<Quote>>;
}

/// All five production connectors, in registry order.
pub fn default_connectors() -> Result<Vec<Arc<dyn QuoteConnector>>> {
    let upbit = upbit::UpbitConnector::new(upbit::UpbitClient::new()?);
    Ok(vec![
        Arc::new(upbit),
        Arc::new(bithumb::BithumbConnector::new()?),
        Arc::new(binance::BinanceConnector::new()?),
        Arc::new(bybit::BybitConnector::new()?),
        Arc::new(okx::OkxConnector::new()?),
    ])
}

pub(crate) fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .user_agent("kimpbot/1.0")
        .build()
        .context("failed to build http client")
}

/// Assemble a validated `Quote` from a venue's raw fields. Returns `None`
/// when the market string does not parse, the quote currency is not KRW or
/// USDT, or either price is non-positive (NaN included).
pub(crate) fn build_quote(
    exchange: Exchange,
    raw_market: &str,
    bid: f64,
    ask: f64,
    volume24h: Option<f64>,
    fetched_at: DateTime<Utc>,
) -> Option<Quote> {
    let parsed = symbols::parse_market(exchange, raw_market)?;
    let currency = symbols::currency_of(&parsed.quote)?;
    if !(bid > 0.0 && ask > 0.0) {
        return None;
    }
    let volume24h = volume24h.filter(|v| v.is_finite() && *v >= 0.0);
    Some(Quote {
        exchange,
        market: format!("{}/{}", parsed.base, parsed.quote),
        symbol: parsed.base,
        currency,
        bid,
        ask,
        volume24h,
        fetched_at,
    })
}

/// Lenient numeric field parse for venues that report numbers as strings.
pub(crate) fn parse_f64(raw: &str) -> Option<f64> {
    let v = raw.trim().parse::<f64>().ok()?;
    v.is_finite().then_some(v)
}
