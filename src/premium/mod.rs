//! Cross-currency premium calculation.
//!
//! Every matched KRW/global pair yields two directional records: the kimchi
//! premium (buy global, sell KRW) and the reverse premium (buy KRW, sell
//! global). Conversions use directionally conservative FX legs (the bid
//! rate when the global side is sold, the ask rate when it is bought) so a
//! quoted gap never overstates what the spread and FX slippage allow. One
//! FX snapshot covers the whole batch.

use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{
    Exchange, FxRate, PremiumKind, PremiumOpportunity, Quote, SymbolMatch, TradeDirection,
    GLOBAL_EXCHANGES, KRW_EXCHANGES,
};
use crate::symbols::{self, match_symbols};

#[derive(Debug, Clone)]
pub struct PremiumQuery {
    /// Keep records with `gap_pct <= 0`.
    pub include_negative: bool,
    pub limit: usize,
    pub offset: usize,
    /// Restrict to one asset, matched against canonical and raw tickers.
    pub symbol: Option<String>,
}

impl Default for PremiumQuery {
    fn default() -> Self {
        Self {
            include_negative: true,
            limit: 50,
            offset: 0,
            symbol: None,
        }
    }
}

/// Premiums across every `(krwExchange, globalExchange)` combination.
///
/// The same canonical asset is priced independently per exchange pair,
/// because liquidity differs venue to venue; the pairs are not flattened
/// into a single match set. Ranking is by absolute gap: a deep reverse
/// premium is as interesting to surface as a tall kimchi premium.
pub fn calculate_multi_exchange_premiums(
    krw_by_exchange: &HashMap<Exchange, Vec<Quote>>,
    global_by_exchange: &HashMap<Exchange, Vec<Quote>>,
    fx: &FxRate,
    query: &PremiumQuery,
) -> Vec<PremiumOpportunity> {
    let mut records = Vec::new();

    for krw_exchange in KRW_EXCHANGES {
        let Some(krw_quotes) = krw_by_exchange.get(krw_exchange) else {
            continue;
        };
        let krw_quotes = symbols::filter_krw_markets(krw_quotes);
        for global_exchange in GLOBAL_EXCHANGES {
            let Some(global_quotes) = global_by_exchange.get(global_exchange) else {
                continue;
            };
            let global_quotes = symbols::filter_usdt_markets(global_quotes);
            for matched in match_symbols(&krw_quotes, &global_quotes) {
                let [kimchi, reverse] = premium_pair(&matched, fx);
                records.push(kimchi);
                records.push(reverse);
            }
        }
    }

    if let Some(symbol) = query.symbol.as_deref() {
        let wanted = symbol.trim().to_ascii_uppercase();
        records.retain(|r| {
            r.canonical_symbol == wanted || r.krw_symbol == wanted || r.global_symbol == wanted
        });
    }
    if !query.include_negative {
        records.retain(|r| r.gap_pct > 0.0);
    }

    records.sort_by(|a, b| {
        b.gap_pct
            .abs()
            .total_cmp(&a.gap_pct.abs())
            .then_with(|| a.canonical_symbol.cmp(&b.canonical_symbol))
            .then_with(|| a.krw_exchange.as_str().cmp(b.krw_exchange.as_str()))
            .then_with(|| a.global_exchange.as_str().cmp(b.global_exchange.as_str()))
    });

    records
        .into_iter()
        .skip(query.offset)
        .take(query.limit)
        .collect()
}

/// Both directional records for one matched pair, computed from the same FX
/// snapshot.
fn premium_pair(matched: &SymbolMatch, fx: &FxRate) -> [PremiumOpportunity; 2] {
    let krw = &matched.krw_quote;
    let global = &matched.global_quote;

    // Selling the global leg realizes the FX bid; buying it pays the FX ask.
    let global_bid_krw = global.bid * fx.bid;
    let global_ask_krw = global.ask * fx.ask;

    let kimchi_gap = (krw.bid - global_ask_krw) / global_ask_krw * 100.0;
    let reverse_gap = (global_bid_krw - krw.ask) / krw.ask * 100.0;

    let kimchi_formula = format!(
        "(krwBid {} - globalAsk {} * fxAsk {}) / {} * 100 = {:.4}%",
        krw.bid, global.ask, fx.ask, global_ask_krw, kimchi_gap
    );
    let reverse_formula = format!(
        "(globalBid {} * fxBid {} - krwAsk {}) / {} * 100 = {:.4}%",
        global.bid, fx.bid, krw.ask, krw.ask, reverse_gap
    );

    let base = |kind, direction, gap_pct, formula| PremiumOpportunity {
        id: Uuid::new_v4().to_string(),
        kind,
        canonical_symbol: matched.canonical_symbol.clone(),
        krw_symbol: matched.krw_symbol.clone(),
        global_symbol: matched.global_symbol.clone(),
        krw_exchange: krw.exchange,
        global_exchange: global.exchange,
        krw_bid: krw.bid,
        krw_ask: krw.ask,
        global_bid: global.bid,
        global_ask: global.ask,
        global_bid_krw,
        global_ask_krw,
        fx_rate_bid: fx.bid,
        fx_rate_ask: fx.ask,
        fx_rate_mid: fx.mid,
        fx_source: fx.source.clone(),
        fx_stale: fx.stale,
        fx_timestamp: fx.timestamp,
        gap_pct,
        direction,
        is_alias_pair: matched.is_alias,
        alias_note: matched.is_alias.then(|| {
            format!(
                "{} on {} and {} on {} are the same asset (canonical {})",
                matched.krw_symbol,
                krw.exchange,
                matched.global_symbol,
                global.exchange,
                matched.canonical_symbol
            )
        }),
        formula,
    };

    [
        base(
            PremiumKind::Kimchi,
            TradeDirection::GlobalToKrw,
            kimchi_gap,
            kimchi_formula,
        ),
        base(
            PremiumKind::Reverse,
            TradeDirection::KrwToGlobal,
            reverse_gap,
            reverse_formula,
        ),
    ]
}
