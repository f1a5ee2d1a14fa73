//! Post-calculation admissibility filtering.
//!
//! Every predicate is evaluated independently for every opportunity; a
//! failure appends one exclusion and never short-circuits the rest, so
//! debug mode can show the complete failure set. In normal mode an
//! opportunity passes iff its exclusion list is empty; in debug mode
//! everything is returned with whatever exclusions it accumulated.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;

use crate::models::{
    ArbitrageOpportunity, Currency, Exchange, FilterExclusion, FilterSettings, Quote,
};

pub const VOLUME_MISSING: &str = "VOLUME_MISSING";
pub const VOLUME_TOO_LOW: &str = "VOLUME_TOO_LOW";
pub const PRICE_TOO_LOW: &str = "PRICE_TOO_LOW";
pub const GAP_TOO_LARGE: &str = "GAP_TOO_LARGE";
pub const SPREAD_TOO_WIDE: &str = "SPREAD_TOO_WIDE";
pub const QUOTE_STALE: &str = "QUOTE_STALE";
pub const STRATEGY_NOT_ALLOWED: &str = "STRATEGY_NOT_ALLOWED";
pub const GAP_TOO_SMALL: &str = "GAP_TOO_SMALL";
pub const NO_COMMON_NETWORK: &str = "NO_COMMON_NETWORK";
pub const NO_DEPOSIT_ADDRESS: &str = "NO_DEPOSIT_ADDRESS";
pub const EXCHANGE_EXCLUDED: &str = "EXCHANGE_EXCLUDED";

/// An opportunity plus the exclusions it collected.
#[derive(Debug, Clone, Serialize)]
pub struct FilteredOpportunity {
    #[serde(flatten)]
    pub opportunity: ArbitrageOpportunity,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclusions: Vec<FilterExclusion>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOutcome {
    pub data: Vec<FilteredOpportunity>,
    pub total: usize,
    pub filtered_out: usize,
}

/// Evaluate all predicates over the batch. `quotes_by_leg` maps
/// `(exchange, market string)` to the underlying quote so spread and
/// staleness can be checked against the legs that produced each
/// opportunity.
pub fn apply_filters(
    opportunities: Vec<ArbitrageOpportunity>,
    settings: &FilterSettings,
    quotes_by_leg: &HashMap<(Exchange, String), Quote>,
    now: DateTime<Utc>,
) -> FilterOutcome {
    let total = opportunities.len();
    let annotated: Vec<FilteredOpportunity> = opportunities
        .into_iter()
        .map(|opportunity| {
            let exclusions = exclusions_for(&opportunity, settings, quotes_by_leg, now);
            FilteredOpportunity {
                opportunity,
                exclusions,
            }
        })
        .collect();

    let filtered_out = annotated.iter().filter(|o| !o.exclusions.is_empty()).count();
    let data = if settings.debug_mode {
        annotated
    } else {
        annotated
            .into_iter()
            .filter(|o| o.exclusions.is_empty())
            .collect()
    };

    FilterOutcome {
        data,
        total,
        filtered_out,
    }
}

fn exclusions_for(
    opp: &ArbitrageOpportunity,
    s: &FilterSettings,
    quotes_by_leg: &HashMap<(Exchange, String), Quote>,
    now: DateTime<Utc>,
) -> Vec<FilterExclusion> {
    let mut exclusions = Vec::new();

    match opp.volume24h_usd {
        None => {
            if s.exclude_if_volume_missing {
                exclusions.push(FilterExclusion {
                    code: VOLUME_MISSING,
                    reason: "no 24h volume data for one or both legs".to_string(),
                    details: None,
                });
            }
        }
        Some(volume) => {
            if volume < s.min_volume_usd_24h {
                exclusions.push(FilterExclusion {
                    code: VOLUME_TOO_LOW,
                    reason: format!(
                        "24h volume ${:.0} below floor ${:.0}",
                        volume, s.min_volume_usd_24h
                    ),
                    details: Some(json!({ "volumeUsd": volume })),
                });
            }
        }
    }

    if let Some(price_usd) = buy_price_usd(opp) {
        if price_usd < s.min_price_usd {
            exclusions.push(FilterExclusion {
                code: PRICE_TOO_LOW,
                reason: format!(
                    "buy price ${:.6} below minimum ${}",
                    price_usd, s.min_price_usd
                ),
                details: None,
            });
        }
    }

    if opp.gross_gap_pct > s.max_gap_pct {
        exclusions.push(FilterExclusion {
            code: GAP_TOO_LARGE,
            reason: format!(
                "gap {:.2}% above ceiling {:.2}%, likely bad data",
                opp.gross_gap_pct, s.max_gap_pct
            ),
            details: None,
        });
    }

    let wide_legs: Vec<serde_json::Value> = leg_quotes(opp, quotes_by_leg)
        .filter(|(_, q)| q.spread_pct() > s.max_spread_pct)
        .map(|(side, q)| json!({ "side": side, "exchange": q.exchange, "spreadPct": q.spread_pct() }))
        .collect();
    if !wide_legs.is_empty() {
        exclusions.push(FilterExclusion {
            code: SPREAD_TOO_WIDE,
            reason: format!("bid/ask spread above {:.2}% on a leg", s.max_spread_pct),
            details: Some(json!({ "legs": wide_legs })),
        });
    }

    let stale_legs: Vec<serde_json::Value> = leg_quotes(opp, quotes_by_leg)
        .filter(|(_, q)| (now - q.fetched_at).num_seconds() > s.max_quote_age_seconds)
        .map(|(side, q)| {
            json!({
                "side": side,
                "exchange": q.exchange,
                "ageSeconds": (now - q.fetched_at).num_seconds(),
            })
        })
        .collect();
    if !stale_legs.is_empty() {
        exclusions.push(FilterExclusion {
            code: QUOTE_STALE,
            reason: format!("quote older than {}s on a leg", s.max_quote_age_seconds),
            details: Some(json!({ "legs": stale_legs })),
        });
    }

    if let Some(allowed) = &s.allowed_types {
        if !allowed.contains(&opp.kind) {
            exclusions.push(FilterExclusion {
                code: STRATEGY_NOT_ALLOWED,
                reason: "strategy type not in the allowed set".to_string(),
                details: None,
            });
        }
    }

    if opp.gross_gap_pct < s.min_gap_pct {
        exclusions.push(FilterExclusion {
            code: GAP_TOO_SMALL,
            reason: format!(
                "gap {:.2}% below floor {:.2}%",
                opp.gross_gap_pct, s.min_gap_pct
            ),
            details: None,
        });
    }

    if s.require_common_open_network && opp.candidate_networks.is_empty() {
        exclusions.push(FilterExclusion {
            code: NO_COMMON_NETWORK,
            reason: "no transfer network open on both legs".to_string(),
            details: None,
        });
    }

    if s.require_deposit_address && opp.deposit_address_ok != Some(true) {
        exclusions.push(FilterExclusion {
            code: NO_DEPOSIT_ADDRESS,
            reason: format!(
                "no deposit address provisioned on {} for {}",
                opp.sell_exchange, opp.base
            ),
            details: None,
        });
    }

    let banned: Vec<Exchange> = [opp.buy_exchange, opp.sell_exchange]
        .into_iter()
        .filter(|e| s.exclude_exchanges.contains(e))
        .collect();
    if !banned.is_empty() {
        exclusions.push(FilterExclusion {
            code: EXCHANGE_EXCLUDED,
            reason: "a leg is on an excluded exchange".to_string(),
            details: Some(json!({ "exchanges": banned })),
        });
    }

    exclusions
}

fn buy_price_usd(opp: &ArbitrageOpportunity) -> Option<f64> {
    match opp.quote {
        Currency::Usdt => Some(opp.buy_price),
        Currency::Krw => opp.fx.as_ref().map(|fx| opp.buy_price / fx.mid),
    }
}

fn leg_quotes<'a>(
    opp: &'a ArbitrageOpportunity,
    quotes_by_leg: &'a HashMap<(Exchange, String), Quote>,
) -> impl Iterator<Item = (&'static str, &'a Quote)> {
    let market = format!("{}/{}", opp.base, opp.quote);
    let buy = quotes_by_leg
        .get(&(opp.buy_exchange, market.clone()))
        .map(|q| ("buy", q));
    let sell = quotes_by_leg
        .get(&(opp.sell_exchange, market))
        .map(|q| ("sell", q));
    buy.into_iter().chain(sell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OpportunityType, RouteType};
    use chrono::Duration;

    fn passing_opportunity() -> ArbitrageOpportunity {
        ArbitrageOpportunity {
            id: "test".to_string(),
            kind: OpportunityType::GlobalToGlobal,
            base: "SOL".to_string(),
            quote: Currency::Usdt,
            buy_exchange: Exchange::Binance,
            sell_exchange: Exchange::Bybit,
            buy_price: 150.0,
            sell_price: 151.5,
            gross_gap_pct: 1.0,
            net_profit_pct: 0.7,
            route_type: RouteType::Global,
            candidate_networks: vec!["SOL".to_string()],
            deposit_address_ok: Some(true),
            fx: None,
            updated_at: Utc::now(),
            volume24h_usd: Some(300_000.0),
        }
    }

    fn leg_quote(exchange: Exchange, bid: f64, ask: f64, fetched_at: DateTime<Utc>) -> Quote {
        Quote {
            exchange,
            symbol: "SOL".to_string(),
            market: "SOL/USDT".to_string(),
            currency: Currency::Usdt,
            bid,
            ask,
            volume24h: Some(300_000.0),
            fetched_at,
        }
    }

    fn fresh_legs(now: DateTime<Utc>) -> HashMap<(Exchange, String), Quote> {
        let mut legs = HashMap::new();
        legs.insert(
            (Exchange::Binance, "SOL/USDT".to_string()),
            leg_quote(Exchange::Binance, 149.9, 150.0, now),
        );
        legs.insert(
            (Exchange::Bybit, "SOL/USDT".to_string()),
            leg_quote(Exchange::Bybit, 151.5, 151.6, now),
        );
        legs
    }

    #[test]
    fn clean_opportunity_passes_with_zero_exclusions() {
        let now = Utc::now();
        let outcome = apply_filters(
            vec![passing_opportunity()],
            &FilterSettings::default(),
            &fresh_legs(now),
            now,
        );
        assert_eq!(outcome.total, 1);
        assert_eq!(outcome.filtered_out, 0);
        assert_eq!(outcome.data.len(), 1);
        assert!(outcome.data[0].exclusions.is_empty());
    }

    #[test]
    fn debug_mode_annotates_missing_volume_instead_of_dropping() {
        let now = Utc::now();
        let mut opp = passing_opportunity();
        opp.volume24h_usd = None;

        let settings = FilterSettings {
            debug_mode: true,
            ..Default::default()
        };
        let outcome = apply_filters(vec![opp], &settings, &fresh_legs(now), now);
        assert_eq!(outcome.data.len(), 1);
        assert_eq!(outcome.filtered_out, 1);
        assert_eq!(outcome.data[0].exclusions.len(), 1);
        assert_eq!(outcome.data[0].exclusions[0].code, VOLUME_MISSING);
    }

    #[test]
    fn missing_volume_is_acceptable_when_policy_allows() {
        let now = Utc::now();
        let mut opp = passing_opportunity();
        opp.volume24h_usd = None;

        let settings = FilterSettings {
            exclude_if_volume_missing: false,
            ..Default::default()
        };
        let outcome = apply_filters(vec![opp], &settings, &fresh_legs(now), now);
        assert_eq!(outcome.filtered_out, 0);
        assert!(outcome.data[0].exclusions.is_empty());
    }

    #[test]
    fn normal_mode_drops_failing_opportunities() {
        let now = Utc::now();
        let mut opp = passing_opportunity();
        opp.volume24h_usd = Some(1_000.0);

        let outcome = apply_filters(
            vec![opp, passing_opportunity()],
            &FilterSettings::default(),
            &fresh_legs(now),
            now,
        );
        assert_eq!(outcome.total, 2);
        assert_eq!(outcome.filtered_out, 1);
        assert_eq!(outcome.data.len(), 1);
    }

    #[test]
    fn predicates_accumulate_without_short_circuiting() {
        let now = Utc::now();
        let mut opp = passing_opportunity();
        opp.volume24h_usd = None;
        opp.gross_gap_pct = 0.2;
        opp.candidate_networks.clear();

        let settings = FilterSettings {
            debug_mode: true,
            ..Default::default()
        };
        let outcome = apply_filters(vec![opp], &settings, &fresh_legs(now), now);
        let codes: Vec<&str> = outcome.data[0].exclusions.iter().map(|e| e.code).collect();
        assert_eq!(codes, vec![VOLUME_MISSING, GAP_TOO_SMALL, NO_COMMON_NETWORK]);
    }

    #[test]
    fn stale_leg_quotes_are_flagged() {
        let now = Utc::now();
        let mut legs = fresh_legs(now);
        legs.get_mut(&(Exchange::Bybit, "SOL/USDT".to_string()))
            .unwrap()
            .fetched_at = now - Duration::seconds(10);

        let settings = FilterSettings {
            debug_mode: true,
            ..Default::default()
        };
        let outcome = apply_filters(vec![passing_opportunity()], &settings, &legs, now);
        let codes: Vec<&str> = outcome.data[0].exclusions.iter().map(|e| e.code).collect();
        assert_eq!(codes, vec![QUOTE_STALE]);
    }

    #[test]
    fn wide_leg_spread_is_flagged() {
        let now = Utc::now();
        let mut legs = fresh_legs(now);
        // ~3.3% spread on the sell leg.
        legs.insert(
            (Exchange::Bybit, "SOL/USDT".to_string()),
            leg_quote(Exchange::Bybit, 150.0, 155.0, now),
        );

        let settings = FilterSettings {
            debug_mode: true,
            ..Default::default()
        };
        let outcome = apply_filters(vec![passing_opportunity()], &settings, &legs, now);
        let codes: Vec<&str> = outcome.data[0].exclusions.iter().map(|e| e.code).collect();
        assert_eq!(codes, vec![SPREAD_TOO_WIDE]);
    }

    #[test]
    fn strategy_and_exchange_restrictions_apply() {
        let now = Utc::now();
        let settings = FilterSettings {
            allowed_types: Some(vec![OpportunityType::KrwToKrw]),
            exclude_exchanges: vec![Exchange::Bybit],
            debug_mode: true,
            ..Default::default()
        };
        let outcome = apply_filters(vec![passing_opportunity()], &settings, &fresh_legs(now), now);
        let codes: Vec<&str> = outcome.data[0].exclusions.iter().map(|e| e.code).collect();
        assert_eq!(codes, vec![STRATEGY_NOT_ALLOWED, EXCHANGE_EXCLUDED]);
    }

    #[test]
    fn unprovisioned_deposit_address_is_flagged() {
        let now = Utc::now();
        let mut opp = passing_opportunity();
        opp.deposit_address_ok = None;

        let settings = FilterSettings {
            debug_mode: true,
            ..Default::default()
        };
        let outcome = apply_filters(vec![opp], &settings, &fresh_legs(now), now);
        let codes: Vec<&str> = outcome.data[0].exclusions.iter().map(|e| e.code).collect();
        assert_eq!(codes, vec![NO_DEPOSIT_ADDRESS]);
    }
}
