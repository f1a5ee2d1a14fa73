//! Arbitrage detection engine.
//!
//! Scans every unordered exchange pair within a currency family for
//! buy-here/sell-there gaps. Cross-currency pairs are never compared here;
//! that is the premium calculator's job.

use chrono::Utc;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::arbitrage::fees::FeeModel;
use crate::models::{
    ArbitrageOpportunity, Currency, FxRate, OpportunityType, Quote, RouteType,
};

/// Tickers excluded from scanning: pegged assets and placeholder listings
/// whose "gaps" are noise, matched exactly against the base symbol.
const EXCLUDED_TICKERS: &[&str] = &[
    "USDT", "USDC", "BUSD", "TUSD", "FDUSD", "DAI", "USDP", "UST",
];

/// Gaps at or above this are treated as stale/erroneous quotes, not alpha.
const MAX_PLAUSIBLE_GAP_PCT: f64 = 50.0;

/// Quotes asking below one US cent are likely data artifacts.
const MIN_ASK_USD: f64 = 0.01;

pub struct ArbitrageEngine {
    fees: FeeModel,
}

impl ArbitrageEngine {
    pub fn new(fees: FeeModel) -> Self {
        Self { fees }
    }

    /// Rank cross-exchange gaps over one quote snapshot.
    ///
    /// A direction is emitted only for `min_gap_pct < gap < 50`; both bounds
    /// are strict. The FX rate is used for USD normalization of KRW-side
    /// prices and volumes, not for cross-currency comparison.
    pub fn calculate(
        &self,
        quotes: &[Quote],
        min_gap_pct: f64,
        limit: usize,
        fx: Option<&FxRate>,
    ) -> Vec<ArbitrageOpportunity> {
        // Group by base symbol, then by currency family within the symbol.
        // BTreeMap keeps output ordering independent of input map ordering.
        let mut by_symbol: BTreeMap<&str, Vec<&Quote>> = BTreeMap::new();
        for quote in quotes {
            if EXCLUDED_TICKERS.contains(&quote.symbol.as_str()) {
                continue;
            }
            if let Some(ask_usd) = usd_value(quote.ask, quote.currency, fx) {
                if ask_usd < MIN_ASK_USD {
                    continue;
                }
            }
            by_symbol.entry(quote.symbol.as_str()).or_default().push(quote);
        }

        let mut opportunities = Vec::new();
        for (_, group) in by_symbol {
            for currency in [Currency::Krw, Currency::Usdt] {
                let family: Vec<&Quote> = group
                    .iter()
                    .copied()
                    .filter(|q| q.currency == currency)
                    .collect();
                for i in 0..family.len() {
                    for j in (i + 1)..family.len() {
                        for (buy, sell) in [(family[i], family[j]), (family[j], family[i])] {
                            if let Some(opp) = self.opportunity(buy, sell, min_gap_pct, fx) {
                                opportunities.push(opp);
                            }
                        }
                    }
                }
            }
        }

        opportunities.sort_by(|a, b| {
            b.gross_gap_pct
                .total_cmp(&a.gross_gap_pct)
                .then_with(|| a.base.cmp(&b.base))
                .then_with(|| a.buy_exchange.as_str().cmp(b.buy_exchange.as_str()))
        });
        opportunities.truncate(limit);
        opportunities
    }

    fn opportunity(
        &self,
        buy: &Quote,
        sell: &Quote,
        min_gap_pct: f64,
        fx: Option<&FxRate>,
    ) -> Option<ArbitrageOpportunity> {
        if buy.exchange == sell.exchange {
            return None;
        }
        let gross_gap_pct = (sell.bid - buy.ask) / buy.ask * 100.0;
        if !(gross_gap_pct > min_gap_pct && gross_gap_pct < MAX_PLAUSIBLE_GAP_PCT) {
            return None;
        }

        let route_type = RouteType::classify(buy.exchange, sell.exchange);
        Some(ArbitrageOpportunity {
            id: Uuid::new_v4().to_string(),
            kind: OpportunityType::classify(buy.currency, sell.currency),
            base: buy.symbol.clone(),
            quote: buy.currency,
            buy_exchange: buy.exchange,
            sell_exchange: sell.exchange,
            buy_price: buy.ask,
            sell_price: sell.bid,
            gross_gap_pct,
            net_profit_pct: self.fees.net_gap_pct(gross_gap_pct, route_type),
            route_type,
            candidate_networks: Vec::new(),
            deposit_address_ok: None,
            fx: fx.cloned(),
            updated_at: Utc::now(),
            volume24h_usd: combined_volume_usd(buy, sell, fx),
        })
    }
}

fn usd_value(amount: f64, currency: Currency, fx: Option<&FxRate>) -> Option<f64> {
    match currency {
        Currency::Usdt => Some(amount),
        Currency::Krw => fx.map(|rate| amount / rate.mid),
    }
}

/// The binding 24h volume across both legs, in USD. `None` when either leg
/// is missing volume data (or cannot be normalized).
fn combined_volume_usd(buy: &Quote, sell: &Quote, fx: Option<&FxRate>) -> Option<f64> {
    let buy_usd = usd_value(buy.volume24h?, buy.currency, fx)?;
    let sell_usd = usd_value(sell.volume24h?, sell.currency, fx)?;
    Some(buy_usd.min(sell_usd))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Exchange;

    fn quote(
        exchange: Exchange,
        symbol: &str,
        currency: Currency,
        bid: f64,
        ask: f64,
        volume: Option<f64>,
    ) -> Quote {
        Quote {
            exchange,
            symbol: symbol.to_string(),
            market: format!("{}/{}", symbol, currency),
            currency,
            bid,
            ask,
            volume24h: volume,
            fetched_at: Utc::now(),
        }
    }

    fn engine() -> ArbitrageEngine {
        ArbitrageEngine::new(FeeModel::default())
    }

    #[test]
    fn emits_the_profitable_direction_of_a_pair() {
        let quotes = vec![
            quote(Exchange::Binance, "SOL", Currency::Usdt, 150.0, 150.1, Some(1e8)),
            quote(Exchange::Bybit, "SOL", Currency::Usdt, 153.0, 153.2, Some(9e7)),
        ];
        let opps = engine().calculate(&quotes, 0.1, 100, None);

        // Buy binance @150.1, sell bybit @153.0 → ~1.93%. The reverse
        // direction is deeply negative and must not appear.
        assert_eq!(opps.len(), 1);
        let opp = &opps[0];
        assert_eq!(opp.buy_exchange, Exchange::Binance);
        assert_eq!(opp.sell_exchange, Exchange::Bybit);
        assert_eq!(opp.buy_price, 150.1);
        assert_eq!(opp.sell_price, 153.0);
        assert!((opp.gross_gap_pct - (153.0 - 150.1) / 150.1 * 100.0).abs() < 1e-9);
        assert!((opp.net_profit_pct - (opp.gross_gap_pct - 0.3)).abs() < 1e-9);
        assert_eq!(opp.kind, OpportunityType::GlobalToGlobal);
        assert_eq!(opp.route_type, RouteType::Global);
        assert_eq!(opp.volume24h_usd, Some(9e7));
    }

    #[test]
    fn gap_exactly_at_minimum_is_excluded() {
        let quotes = vec![
            quote(Exchange::Binance, "ABC", Currency::Usdt, 99.0, 100.0, None),
            quote(Exchange::Bybit, "ABC", Currency::Usdt, 101.0, 101.5, None),
        ];
        // gap = (101 - 100) / 100 * 100 = exactly 1.0
        assert!(engine().calculate(&quotes, 1.0, 100, None).is_empty());
        assert_eq!(engine().calculate(&quotes, 0.99, 100, None).len(), 1);
    }

    #[test]
    fn gap_exactly_at_ceiling_is_excluded() {
        let quotes = vec![
            quote(Exchange::Binance, "ABC", Currency::Usdt, 99.0, 100.0, None),
            quote(Exchange::Bybit, "ABC", Currency::Usdt, 150.0, 150.5, None),
        ];
        // gap = exactly 50.0
        assert!(engine().calculate(&quotes, 0.1, 100, None).is_empty());

        let quotes = vec![
            quote(Exchange::Binance, "ABC", Currency::Usdt, 99.0, 100.0, None),
            quote(Exchange::Bybit, "ABC", Currency::Usdt, 149.99, 150.5, None),
        ];
        assert_eq!(engine().calculate(&quotes, 0.1, 100, None).len(), 1);
    }

    #[test]
    fn stablecoins_and_subcent_listings_are_dropped() {
        let quotes = vec![
            quote(Exchange::Binance, "USDC", Currency::Usdt, 0.999, 1.0, Some(1e9)),
            quote(Exchange::Bybit, "USDC", Currency::Usdt, 1.02, 1.021, Some(1e9)),
            quote(Exchange::Binance, "PEPE", Currency::Usdt, 0.004, 0.0041, Some(1e8)),
            quote(Exchange::Bybit, "PEPE", Currency::Usdt, 0.0045, 0.0046, Some(1e8)),
        ];
        assert!(engine().calculate(&quotes, 0.1, 100, None).is_empty());
    }

    #[test]
    fn cross_currency_families_are_never_compared() {
        let quotes = vec![
            quote(Exchange::Upbit, "BTC", Currency::Krw, 101_000_000.0, 101_100_000.0, None),
            quote(Exchange::Binance, "BTC", Currency::Usdt, 69000.0, 69500.0, None),
        ];
        assert!(engine().calculate(&quotes, 0.1, 100, None).is_empty());
    }

    #[test]
    fn krw_pair_is_classified_domestic() {
        let quotes = vec![
            quote(Exchange::Upbit, "XRP", Currency::Krw, 800.0, 801.0, Some(5e9)),
            quote(Exchange::Bithumb, "XRP", Currency::Krw, 812.0, 813.0, Some(4e9)),
        ];
        let fx = FxRate {
            source: "upbit".to_string(),
            bid: 1447.0,
            ask: 1448.0,
            mid: 1447.5,
            timestamp: Utc::now(),
            stale: false,
        };
        let opps = engine().calculate(&quotes, 0.5, 100, Some(&fx));
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].kind, OpportunityType::KrwToKrw);
        assert_eq!(opps[0].route_type, RouteType::Domestic);
        // KRW volumes are normalized through the FX mid.
        assert!((opps[0].volume24h_usd.unwrap() - 4e9 / 1447.5).abs() < 1.0);
    }

    #[test]
    fn results_are_ranked_by_gap_and_truncated() {
        let quotes = vec![
            quote(Exchange::Binance, "AAA", Currency::Usdt, 100.0, 100.1, None),
            quote(Exchange::Bybit, "AAA", Currency::Usdt, 102.0, 102.1, None),
            quote(Exchange::Binance, "BBB", Currency::Usdt, 50.0, 50.1, None),
            quote(Exchange::Bybit, "BBB", Currency::Usdt, 53.0, 53.1, None),
        ];
        let opps = engine().calculate(&quotes, 0.1, 100, None);
        assert_eq!(opps.len(), 2);
        assert_eq!(opps[0].base, "BBB");
        assert!(opps[0].gross_gap_pct > opps[1].gross_gap_pct);

        let top = engine().calculate(&quotes, 0.1, 1, None);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].base, "BBB");
    }

    #[test]
    fn recalculation_is_stable_modulo_ids() {
        let quotes = vec![
            quote(Exchange::Binance, "AAA", Currency::Usdt, 100.0, 100.1, Some(1e7)),
            quote(Exchange::Bybit, "AAA", Currency::Usdt, 102.0, 102.1, Some(2e7)),
            quote(Exchange::Okx, "AAA", Currency::Usdt, 101.0, 101.2, Some(3e7)),
        ];
        let a = engine().calculate(&quotes, 0.1, 100, None);
        let b = engine().calculate(&quotes, 0.1, 100, None);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.gross_gap_pct, y.gross_gap_pct);
            assert_eq!(x.buy_exchange, y.buy_exchange);
            assert_eq!(x.sell_exchange, y.sell_exchange);
            assert_ne!(x.id, y.id);
        }
    }
}
