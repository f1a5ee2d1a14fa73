//! Bybit REST connector.
//!
//! One spot tickers call carries best bid/ask and 24h turnover together.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use super::{build_quote, parse_f64, QuoteConnector};
use crate::models::{Exchange, Quote};

const BYBIT_API_BASE: &str = "https://api.bybit.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    ret_code: i64,
    ret_msg: String,
    result: TickerResult,
}

#[derive(Debug, Deserialize)]
struct TickerResult {
    list: Vec<Ticker>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    symbol: String,
    bid1_price: String,
    ask1_price: String,
    turnover24h: String,
}

pub struct BybitConnector {
    client: Client,
    base_url: String,
}

impl BybitConnector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: super::http_client()?,
            base_url: BYBIT_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: super::http_client()?,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl QuoteConnector for BybitConnector {
    fn exchange(&self) -> Exchange {
        Exchange::Bybit
    }

    async fn fetch_quotes(&self) -> Result<Vec<Quote>> {
        let url = format!("{}/v5/market/tickers", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("category", "spot")])
            .send()
            .await
            .context("GET /v5/market/tickers failed")?;
        if !resp.status().is_success() {
            anyhow::bail!("GET /v5/market/tickers: {}", resp.status());
        }
        let envelope = resp
            .json::<Envelope>()
            .await
            .context("failed to parse tickers response")?;
        if envelope.ret_code != 0 {
            anyhow::bail!(
                "tickers returned retCode {}: {}",
                envelope.ret_code,
                envelope.ret_msg
            );
        }
        Ok(quotes_from_tickers(envelope.result.list, Utc::now()))
    }
}

fn quotes_from_tickers(tickers: Vec<Ticker>, now: chrono::DateTime<Utc>) -> Vec<Quote> {
    tickers
        .into_iter()
        .filter_map(|t| {
            let bid = parse_f64(&t.bid1_price)?;
            let ask = parse_f64(&t.ask1_price)?;
            let volume = parse_f64(&t.turnover24h);
            build_quote(Exchange::Bybit, &t.symbol, bid, ask, volume, now)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parses_and_filters() {
        let body = r#"{
            "retCode": 0,
            "retMsg": "OK",
            "result": {
                "category": "spot",
                "list": [
                    {"symbol": "BTCUSDT", "bid1Price": "69010.5", "ask1Price": "69011.0", "turnover24h": "900000000"},
                    {"symbol": "ETHBTC", "bid1Price": "0.05", "ask1Price": "0.051", "turnover24h": "10"},
                    {"symbol": "SOLUSDT", "bid1Price": "", "ask1Price": "150.2", "turnover24h": "5"}
                ]
            }
        }"#;
        let envelope: Envelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.ret_code, 0);

        let quotes = quotes_from_tickers(envelope.result.list, Utc::now());
        // ETHBTC is not a USDT market; SOLUSDT has an empty bid.
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "BTC");
        assert_eq!(quotes[0].volume24h, Some(9e8));
    }
}
