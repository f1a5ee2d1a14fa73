//! Bithumb REST connector.
//!
//! The `ALL_KRW` endpoints return one object keyed by asset ticker, with a
//! few scalar metadata fields mixed into the same map, and every number as
//! a string. Entries that don't decode as orderbook/ticker payloads are
//! metadata and skipped.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use super::{build_quote, parse_f64, QuoteConnector};
use crate::models::{Exchange, Quote};
use crate::symbols;

const BITHUMB_API_BASE: &str = "https://api.bithumb.com";

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    data: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct OrderbookLevel {
    price: String,
}

#[derive(Debug, Deserialize)]
struct OrderbookEntry {
    bids: Vec<OrderbookLevel>,
    asks: Vec<OrderbookLevel>,
}

#[derive(Debug, Deserialize)]
struct TickerEntry {
    #[serde(rename = "acc_trade_value_24H")]
    acc_trade_value_24h: String,
}

pub struct BithumbConnector {
    client: Client,
    base_url: String,
}

impl BithumbConnector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: super::http_client()?,
            base_url: BITHUMB_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: super::http_client()?,
            base_url: base_url.into(),
        })
    }

    async fn fetch_envelope(&self, path: &str) -> Result<Envelope> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", path))?;
        if !resp.status().is_success() {
            anyhow::bail!("GET {}: {}", path, resp.status());
        }
        let envelope = resp
            .json::<Envelope>()
            .await
            .with_context(|| format!("failed to parse {} response", path))?;
        if envelope.status != "0000" {
            anyhow::bail!("{} returned status {}", path, envelope.status);
        }
        Ok(envelope)
    }
}

#[async_trait]
impl QuoteConnector for BithumbConnector {
    fn exchange(&self) -> Exchange {
        Exchange::Bithumb
    }

    async fn fetch_quotes(&self) -> Result<Vec<Quote>> {
        let books = self.fetch_envelope("/public/orderbook/ALL_KRW").await?;
        let tickers = self.fetch_envelope("/public/ticker/ALL_KRW").await?;

        let volumes: HashMap<String, f64> = tickers
            .data
            .into_iter()
            .filter_map(|(ticker, value)| {
                let entry: TickerEntry = serde_json::from_value(value).ok()?;
                Some((ticker, parse_f64(&entry.acc_trade_value_24h)?))
            })
            .collect();

        let now = Utc::now();
        Ok(quotes_from_orderbooks(books.data, &volumes, now))
    }
}

fn quotes_from_orderbooks(
    data: HashMap<String, Value>,
    volumes: &HashMap<String, f64>,
    now: chrono::DateTime<Utc>,
) -> Vec<Quote> {
    let mut quotes: Vec<Quote> = data
        .into_iter()
        .filter_map(|(ticker, value)| {
            let entry: OrderbookEntry = serde_json::from_value(value).ok()?;
            let bid = parse_f64(&entry.bids.first()?.price)?;
            let ask = parse_f64(&entry.asks.first()?.price)?;
            let market = symbols::format_market(Exchange::Bithumb, &ticker.to_ascii_uppercase(), "KRW");
            let volume = volumes.get(&ticker).copied();
            build_quote(Exchange::Bithumb, &market, bid, ask, volume, now)
        })
        .collect();
    // The source map has no stable order.
    quotes.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    quotes
}
