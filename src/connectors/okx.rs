//! OKX REST connector.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use super::{build_quote, parse_f64, QuoteConnector};
use crate::models::{Exchange, Quote};

const OKX_API_BASE: &str = "https://www.okx.com";

#[derive(Debug, Deserialize)]
struct Envelope {
    code: String,
    msg: String,
    data: Vec<Ticker>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    inst_id: String,
    bid_px: String,
    ask_px: String,
    /// 24h volume in the quote currency.
    vol_ccy24h: String,
}

pub struct OkxConnector {
    client: Client,
    base_url: String,
}

impl OkxConnector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: super::http_client()?,
            base_url: OKX_API_BASE.to_string(),
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
impl QuoteConnector for OkxConnector {
    fn exchange(&self) -> Exchange {
        Exchange::Okx
    }

    async fn fetch_quotes(&self) -> Result<Vec<Quote>> {
        let url = format!("{}/api/v5/market/tickers", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("instType", "SPOT")])
            .send()
            .await
            .context("GET /api/v5/market/tickers failed")?;
        if !resp.status().is_success() {
            anyhow::bail!("GET /api/v5/market/tickers: {}", resp.status());
        }
        let envelope = resp
            .json::<Envelope>()
            .await
            .context("failed to parse tickers response")?;
        if envelope.code != "0" {
            anyhow::bail!("tickers returned code {}: {}", envelope.code, envelope.msg);
        }
        Ok(quotes_from_tickers(envelope.data, Utc::now()))
    }
}

fn quotes_from_tickers(tickers: Vec<Ticker>, now: chrono::DateTime<Utc>) -> Vec<Quote> {
    tickers
        .into_iter()
        .filter_map(|t| {
            let bid = parse_f64(&t.bid_px)?;
            let ask = parse_f64(&t.ask_px)?;
            let volume = parse_f64(&t.vol_ccy24h);
            build_quote(Exchange::Okx, &t.inst_id, bid, ask, volume, now)
        })
        .collect()
}
