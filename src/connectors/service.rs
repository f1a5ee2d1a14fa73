//! Concurrent quote collection across all connectors.
//!
//! One logical request fans out to every venue at once. A venue failure is
//! contained: it logs a warning and contributes an empty set, because
//! partial data beats total failure. Only when every venue fails with
//! nothing cached does the request itself fail.

use anyhow::Result;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::QuoteConnector;
use crate::cache::TtlCache;
use crate::models::{Exchange, Quote};

pub struct QuoteService {
    connectors: Vec<Arc<dyn QuoteConnector>>,
    cache: TtlCache<Exchange, Vec<Quote>>,
    cache_ttl: Duration,
}

impl QuoteService {
    pub fn new(connectors: Vec<Arc<dyn QuoteConnector>>, cache_ttl: Duration) -> Self {
        Self {
            connectors,
            cache: TtlCache::new(),
            cache_ttl,
        }
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        self.connectors.iter().map(|c| c.exchange()).collect()
    }

    /// Current snapshot per exchange. Fetches every non-cached venue
    /// concurrently; the result map always has one entry per connector.
    pub async fn quotes_by_exchange(&self) -> Result<HashMap<Exchange, Vec<Quote>>> {
        let mut result: HashMap<Exchange, Vec<Quote>> = HashMap::new();
        let mut to_fetch = Vec::new();

        for connector in &self.connectors {
            let exchange = connector.exchange();
            if let Some(quotes) = self.cache.get(&exchange) {
                debug!(exchange = %exchange, count = quotes.len(), "quote cache hit");
                result.insert(exchange, quotes);
            } else {
                to_fetch.push(connector.clone());
            }
        }

        let fetched = join_all(to_fetch.iter().map(|connector| async move {
            (connector.exchange(), connector.fetch_quotes().await)
        }))
        .await;

        let mut live_failures = 0usize;
        for (exchange, outcome) in fetched {
            match outcome {
                Ok(quotes) => {
                    debug!(exchange = %exchange, count = quotes.len(), "quotes fetched");
                    self.cache.insert(exchange, quotes.clone(), self.cache_ttl);
                    result.insert(exchange, quotes);
                }
                Err(e) => {
                    warn!(exchange = %exchange, error = %e, "quote fetch failed, substituting empty set");
                    live_failures += 1;
                    result.insert(exchange, Vec::new());
                }
            }
        }

        if live_failures == self.connectors.len() {
            anyhow::bail!("all quote sources failed");
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Currency;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedConnector {
        exchange: Exchange,
        fail: bool,
        calls: AtomicUsize,
    }

    impl ScriptedConnector {
        fn new(exchange: Exchange, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                exchange,
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl QuoteConnector for ScriptedConnector {
        fn exchange(&self) -> Exchange {
            self.exchange
        }

        async fn fetch_quotes(&self) -> Result<Vec<Quote>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("connection refused")
            }
            Ok(vec![Quote {
                exchange: self.exchange,
                symbol: "BTC".to_string(),
                market: "BTC/USDT".to_string(),
                currency: Currency::Usdt,
                bid: 69000.0,
                ask: 69500.0,
                volume24h: None,
                fetched_at: Utc::now(),
            }])
        }
    }

    #[tokio::test]
    async fn failed_venue_substitutes_empty_set() {
        let ok = ScriptedConnector::new(Exchange::Binance, false);
        let bad = ScriptedConnector::new(Exchange::Bybit, true);
        let service = QuoteService::new(vec![ok, bad], Duration::from_secs(60));

        let map = service.quotes_by_exchange().await.unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&Exchange::Binance].len(), 1);
        assert!(map[&Exchange::Bybit].is_empty());
    }

    #[tokio::test]
    async fn all_venues_failing_is_a_hard_error() {
        let a = ScriptedConnector::new(Exchange::Binance, true);
        let b = ScriptedConnector::new(Exchange::Bybit, true);
        let service = QuoteService::new(vec![a, b], Duration::from_secs(60));

        assert!(service.quotes_by_exchange().await.is_err());
    }

    #[tokio::test]
    async fn second_read_within_ttl_uses_cache() {
        let connector = ScriptedConnector::new(Exchange::Binance, false);
        let service = QuoteService::new(vec![connector.clone()], Duration::from_secs(60));

        service.quotes_by_exchange().await.unwrap();
        service.quotes_by_exchange().await.unwrap();
        assert_eq!(connector.calls.load(Ordering::SeqCst), 1);
    }
}
