//! Binance REST connector.
//!
//! Best bid/ask from `bookTicker`, 24h quote-currency notional from the
//! `24hr` statistics endpoint, joined on the concatenated symbol.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

use super::{build_quote, parse_f64, QuoteConnector};
use crate::models::{Exchange, Quote};

const BINANCE_API_BASE: &str = "https://api.binance.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookTicker {
    symbol: String,
    bid_price: String,
    ask_price: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    symbol: String,
    quote_volume: String,
}

pub struct BinanceConnector {
    client: Client,
    base_url: String,
}

impl BinanceConnector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: super::http_client()?,
            base_url: BINANCE_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: super::http_client()?,
            base_url: base_url.into(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
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
        resp.json::<T>()
            .await
            .with_context(|| format!("failed to parse {} response", path))
    }
}

#[async_trait]
impl QuoteConnector for BinanceConnector {
    fn exchange(&self) -> Exchange {
        Exchange::Binance
    }

    async fn fetch_quotes(&self) -> Result<Vec<Quote>> {
        let books: Vec<BookTicker> = self.get_json("/api/v3/ticker/bookTicker").await?;
        let stats: Vec<Ticker24h> = self.get_json("/api/v3/ticker/24hr").await?;

        let volumes: HashMap<String, f64> = stats
            .into_iter()
            .filter_map(|t| Some((t.symbol, parse_f64(&t.quote_volume)?)))
            .collect();

        Ok(quotes_from_book_tickers(books, &volumes, Utc::now()))
    }
}

fn quotes_from_book_tickers(
    books: Vec<BookTicker>,
    volumes: &HashMap<String, f64>,
    now: chrono::DateTime<Utc>,
) -> Vec<Quote> {
    books
        .into_iter()
        .filter_map(|book| {
            let bid = parse_f64(&book.bid_price)?;
            let ask = parse_f64(&book.ask_price)?;
            let volume = volumes.get(&book.symbol).copied();
            build_quote(Exchange::Binance, &book.symbol, bid, ask, volume, now)
        })
        .collect()
}
