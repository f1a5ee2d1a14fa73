//! Upbit REST client and connector.
//!
//! Markets are coded quote-first (`KRW-BTC`). Best bid/ask comes from the
//! orderbook endpoint, 24h notional from the ticker endpoint; both accept
//! comma-separated market batches. The low-level client is shared with the
//! FX rate source, which reads the KRW-USDT book through it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

use super::{build_quote, QuoteConnector};
use crate::models::{Exchange, Quote};

const UPBIT_API_BASE: &str = "https://api.upbit.com";

/// Markets per batched orderbook/ticker request.
const BATCH_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
pub struct MarketInfo {
    pub market: String,
}

#[derive(Debug, Deserialize)]
struct OrderbookUnit {
    bid_price: f64,
    ask_price: f64,
}

#[derive(Debug, Deserialize)]
struct Orderbook {
    market: String,
    orderbook_units: Vec<OrderbookUnit>,
}

#[derive(Debug, Deserialize)]
struct Ticker {
    market: String,
    acc_trade_price_24h: f64,
}

/// Top-of-book extract for one market.
#[derive(Debug, Clone)]
pub struct OrderbookTop {
    pub market: String,
    pub bid: f64,
    pub ask: f64,
}

#[derive(Clone)]
pub struct UpbitClient {
    client: Client,
    base_url: String,
}

impl UpbitClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: super::http_client()?,
            base_url: UPBIT_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: super::http_client()?,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn market_codes(&self) -> Result<Vec<MarketInfo>> {
        let resp = self
            .client
            .get(self.url("/v1/market/all"))
            .send()
            .await
            .context("GET /v1/market/all failed")?;
        if !resp.status().is_success() {
            anyhow::bail!("GET /v1/market/all: {}", resp.status());
        }
        resp.json::<Vec<MarketInfo>>()
            .await
            .context("failed to parse market list")
    }

    pub async fn orderbook_tops(&self, markets: &[String]) -> Result<Vec<OrderbookTop>> {
        let resp = self
            .client
            .get(self.url("/v1/orderbook"))
            .query(&[("markets", markets.join(","))])
            .send()
            .await
            .context("GET /v1/orderbook failed")?;
        if !resp.status().is_success() {
            anyhow::bail!("GET /v1/orderbook: {}", resp.status());
        }
        let books = resp
            .json::<Vec<Orderbook>>()
            .await
            .context("failed to parse orderbook response")?;
        Ok(books
            .into_iter()
            .filter_map(|book| {
                let top = book.orderbook_units.first()?;
                Some(OrderbookTop {
                    market: book.market,
                    bid: top.bid_price,
                    ask: top.ask_price,
                })
            })
            .collect())
    }

    async fn tickers(&self, markets: &[String]) -> Result<Vec<Ticker>> {
        let resp = self
            .client
            .get(self.url("/v1/ticker"))
            .query(&[("markets", markets.join(","))])
            .send()
            .await
            .context("GET /v1/ticker failed")?;
        if !resp.status().is_success() {
            anyhow::bail!("GET /v1/ticker: {}", resp.status());
        }
        resp.json::<Vec<Ticker>>()
            .await
            .context("failed to parse ticker response")
    }
}

pub struct UpbitConnector {
    client: UpbitClient,
}

impl UpbitConnector {
    pub fn new(client: UpbitClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QuoteConnector for UpbitConnector {
    fn exchange(&self) -> Exchange {
        Exchange::Upbit
    }

    async fn fetch_quotes(&self) -> Result<Vec<Quote>> {
        let codes: Vec<String> = self
            .client
            .market_codes()
            .await?
            .into_iter()
            .map(|m| m.market)
            .filter(|code| {
                crate::symbols::parse_market(Exchange::Upbit, code)
                    .and_then(|p| crate::symbols::currency_of(&p.quote))
                    .is_some()
            })
            .collect();

        let mut quotes = Vec::with_capacity(codes.len());
        for chunk in codes.chunks(BATCH_SIZE) {
            let tops = self.client.orderbook_tops(chunk).await?;
            let volumes: HashMap<String, f64> = self
                .client
                .tickers(chunk)
                .await?
                .into_iter()
                .map(|t| (t.market, t.acc_trade_price_24h))
                .collect();

            let now = Utc::now();
            quotes.extend(tops.into_iter().filter_map(|top| {
                let volume = volumes.get(&top.market).copied();
                build_quote(Exchange::Upbit, &top.market, top.bid, top.ask, volume, now)
            }));
        }
        Ok(quotes)
    }
}
