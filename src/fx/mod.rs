//! USDT/KRW rate service.
//!
//! One underlying source feeds two cache windows: a short live TTL during
//! which reads return immediately, and a longer fallback TTL during which a
//! failed re-fetch serves the last good value marked `stale`. With no valid
//! cache and a failing source there is no rate to return, and every premium
//! calculation depends on having one, so that failure is hard.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::connectors::upbit::UpbitClient;
use crate::models::FxRate;

/// Raw bid/ask snapshot from a rate source.
#[derive(Debug, Clone, Copy)]
pub struct FxQuote {
    pub bid: f64,
    pub ask: f64,
}

#[async_trait]
pub trait FxRateSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self) -> Result<FxQuote>;
}

/// Derives the rate from Upbit's KRW-USDT orderbook: best bid, best ask.
pub struct UpbitFxSource {
    client: UpbitClient,
}

impl UpbitFxSource {
    pub fn new(client: UpbitClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FxRateSource for UpbitFxSource {
    fn name(&self) -> &str {
        "upbit"
    }

    async fn fetch(&self) -> Result<FxQuote> {
        let markets = ["KRW-USDT".to_string()];
        let tops = self
            .client
            .orderbook_tops(&markets)
            .await
            .context("fetch KRW-USDT orderbook")?;
        let top = tops
            .into_iter()
            .next()
            .context("empty KRW-USDT orderbook response")?;
        if !(top.bid > 0.0 && top.ask > 0.0) {
            anyhow::bail!("non-positive KRW-USDT quote: bid={} ask={}", top.bid, top.ask);
        }
        Ok(FxQuote {
            bid: top.bid,
            ask: top.ask,
        })
    }
}

struct CachedFx {
    rate: FxRate,
    fetched_at: Instant,
}

pub struct FxRateService {
    source: Arc<dyn FxRateSource>,
    live_ttl: Duration,
    fallback_ttl: Duration,
    cache: Mutex<Option<CachedFx>>,
}

impl FxRateService {
    pub fn new(source: Arc<dyn FxRateSource>, live_ttl: Duration, fallback_ttl: Duration) -> Self {
        Self {
            source,
            live_ttl,
            fallback_ttl,
            cache: Mutex::new(None),
        }
    }

    /// Current rate, per the cache state machine. All conversions within one
    /// calculation batch should use a single returned snapshot.
    pub async fn current(&self) -> Result<FxRate> {
        if let Some(rate) = self.live_value() {
            return Ok(rate);
        }

        match self.source.fetch().await {
            Ok(raw) => {
                let rate = FxRate {
                    source: self.source.name().to_string(),
                    bid: raw.bid,
                    ask: raw.ask,
                    mid: (raw.bid + raw.ask) / 2.0,
                    timestamp: Utc::now(),
                    stale: false,
                };
                // A successful fetch refreshes both the live and fallback
                // windows.
                *self.cache.lock() = Some(CachedFx {
                    rate: rate.clone(),
                    fetched_at: Instant::now(),
                });
                debug!(bid = rate.bid, ask = rate.ask, "fx rate refreshed");
                Ok(rate)
            }
            Err(e) => {
                let guard = self.cache.lock();
                if let Some(cached) = guard.as_ref() {
                    if cached.fetched_at.elapsed() < self.fallback_ttl {
                        warn!(error = %e, "fx fetch failed, serving fallback value");
                        let mut rate = cached.rate.clone();
                        rate.stale = true;
                        return Ok(rate);
                    }
                }
                Err(e).context("no usable fx rate: fetch failed and fallback window elapsed")
            }
        }
    }

    fn live_value(&self) -> Option<FxRate> {
        let guard = self.cache.lock();
        guard
            .as_ref()
            .filter(|c| c.fetched_at.elapsed() < self.live_ttl)
            .map(|c| c.rate.clone())
    }
}
