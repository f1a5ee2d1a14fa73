//! End-to-end arbitrage pipeline: gap scan, wallet enrichment and the
//! filter engine, in the order the opportunities endpoint runs them.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

use kimpbot_backend::arbitrage::{ArbitrageEngine, FeeModel};
use kimpbot_backend::enrichment::{EnrichmentService, InMemoryAddressBook, StaticNetworkTable};
use kimpbot_backend::filters::{self, apply_filters};
use kimpbot_backend::models::{Currency, Exchange, FilterSettings, Quote};

fn quote(
    exchange: Exchange,
    symbol: &str,
    bid: f64,
    ask: f64,
    volume: Option<f64>,
) -> Quote {
    Quote {
        exchange,
        symbol: symbol.to_string(),
        market: format!("{}/USDT", symbol),
        currency: Currency::Usdt,
        bid,
        ask,
        volume24h: volume,
        fetched_at: Utc::now(),
    }
}

fn enrichment_service() -> EnrichmentService {
    let table = StaticNetworkTable::with_defaults(&[Exchange::Binance, Exchange::Bybit]);
    let mut book = InMemoryAddressBook::new();
    book.insert(Exchange::Bybit, "SOL");
    EnrichmentService::new(Arc::new(table), Arc::new(book))
}

fn legs_index(quotes: &[Quote]) -> HashMap<(Exchange, String), Quote> {
    quotes
        .iter()
        .map(|q| ((q.exchange, q.market.clone()), q.clone()))
        .collect()
}

#[test]
fn clean_gap_survives_enrichment_and_filtering() {
    let quotes = vec![
        quote(Exchange::Binance, "SOL", 149.9, 150.0, Some(3e8)),
        quote(Exchange::Bybit, "SOL", 151.5, 151.6, Some(2.5e8)),
    ];
    let engine = ArbitrageEngine::new(FeeModel::default());

    let mut opportunities = engine.calculate(&quotes, 0.1, 50, None);
    assert_eq!(opportunities.len(), 1);

    // SOL's default network is open on both venues and the sell venue has
    // an address, so the wallet predicates pass under the default settings.
    let settings = FilterSettings::default();

    enrichment_service().enrich(&mut opportunities);
    assert_eq!(opportunities[0].candidate_networks, vec!["SOL"]);
    assert_eq!(opportunities[0].deposit_address_ok, Some(true));

    let outcome = apply_filters(opportunities, &settings, &legs_index(&quotes), Utc::now());
    assert_eq!(outcome.total, 1);
    assert_eq!(outcome.filtered_out, 0);
    assert_eq!(outcome.data.len(), 1);
    assert!(outcome.data[0].exclusions.is_empty());
}

#[test]
fn debug_mode_reports_the_full_failure_set() {
    // Missing volume on one leg and no deposit address anywhere.
    let quotes = vec![
        quote(Exchange::Binance, "ETH", 3500.0, 3500.5, None),
        quote(Exchange::Bybit, "ETH", 3540.0, 3541.0, Some(2e8)),
    ];
    let engine = ArbitrageEngine::new(FeeModel::default());

    let mut opportunities = engine.calculate(&quotes, 0.1, 50, None);
    assert_eq!(opportunities.len(), 1);
    enrichment_service().enrich(&mut opportunities);

    let settings = FilterSettings {
        debug_mode: true,
        ..Default::default()
    };
    let outcome = apply_filters(opportunities, &settings, &legs_index(&quotes), Utc::now());

    // Debug mode returns the record instead of dropping it.
    assert_eq!(outcome.data.len(), 1);
    assert_eq!(outcome.filtered_out, 1);
    let codes: Vec<&str> = outcome.data[0]
        .exclusions
        .iter()
        .map(|e| e.code)
        .collect();
    assert!(codes.contains(&filters::VOLUME_MISSING));
    assert!(codes.contains(&filters::NO_DEPOSIT_ADDRESS));

    // The same batch in normal mode returns nothing.
    let quotes2 = vec![
        quote(Exchange::Binance, "ETH", 3500.0, 3500.5, None),
        quote(Exchange::Bybit, "ETH", 3540.0, 3541.0, Some(2e8)),
    ];
    let mut opportunities = engine.calculate(&quotes2, 0.1, 50, None);
    enrichment_service().enrich(&mut opportunities);
    let outcome = apply_filters(
        opportunities,
        &FilterSettings::default(),
        &legs_index(&quotes2),
        Utc::now(),
    );
    assert_eq!(outcome.data.len(), 0);
    assert_eq!(outcome.filtered_out, 1);
}

#[test]
fn filter_floor_catches_gaps_the_scan_admitted() {
    // 0.33% gap: above the scan threshold, below the 0.5% filter floor.
    let quotes = vec![
        quote(Exchange::Binance, "SOL", 149.9, 150.0, Some(3e8)),
        quote(Exchange::Bybit, "SOL", 150.5, 150.6, Some(2.5e8)),
    ];
    let engine = ArbitrageEngine::new(FeeModel::default());

    let mut opportunities = engine.calculate(&quotes, 0.1, 50, None);
    assert_eq!(opportunities.len(), 1);
    enrichment_service().enrich(&mut opportunities);

    let settings = FilterSettings {
        debug_mode: true,
        ..Default::default()
    };
    let outcome = apply_filters(opportunities, &settings, &legs_index(&quotes), Utc::now());
    let codes: Vec<&str> = outcome.data[0]
        .exclusions
        .iter()
        .map(|e| e.code)
        .collect();
    assert!(codes.contains(&filters::GAP_TOO_SMALL));
}
