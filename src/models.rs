use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five venues we aggregate quotes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Upbit,
    Bithumb,
    Binance,
    Bybit,
    Okx,
}

/// KRW-denominated venues, in iteration order.
pub const KRW_EXCHANGES: &[Exchange] = &[Exchange::Upbit, Exchange::Bithumb];

/// USDT-denominated venues, in iteration order.
pub const GLOBAL_EXCHANGES: &[Exchange] = &[Exchange::Binance, Exchange::Bybit, Exchange::Okx];

impl Exchange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Upbit => "upbit",
            Exchange::Bithumb => "bithumb",
            Exchange::Binance => "binance",
            Exchange::Bybit => "bybit",
            Exchange::Okx => "okx",
        }
    }

    pub fn parse(s: &str) -> Option<Exchange> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upbit" => Some(Exchange::Upbit),
            "bithumb" => Some(Exchange::Bithumb),
            "binance" => Some(Exchange::Binance),
            "bybit" => Some(Exchange::Bybit),
            "okx" => Some(Exchange::Okx),
            _ => None,
        }
    }

    pub fn is_krw(&self) -> bool {
        matches!(self, Exchange::Upbit | Exchange::Bithumb)
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quote currency of a market, attached to every `Quote` at normalization
/// time so downstream code never branches on market-string substrings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Krw,
    Usdt,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Krw => "KRW",
            Currency::Usdt => "USDT",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One exchange's current snapshot for one asset.
///
/// `bid` and `ask` are validated positive at ingestion; an inverted spread
/// (`bid > ask`) is valid input and may still signal a usable gap in one
/// direction. Snapshots are immutable; a new fetch produces a new set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub exchange: Exchange,
    /// Base asset ticker as the exchange names it (upper-cased).
    pub symbol: String,
    /// Display market string, `BASE/QUOTE`.
    pub market: String,
    pub currency: Currency,
    pub bid: f64,
    pub ask: f64,
    /// 24h notional in the quote currency, when the venue reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume24h: Option<f64>,
    pub fetched_at: DateTime<Utc>,
}

impl Quote {
    /// Midpoint of the bid/ask spread in percent, relative to the bid.
    pub fn spread_pct(&self) -> f64 {
        (self.ask - self.bid) / self.bid * 100.0
    }
}

/// One resolved pairing of a KRW quote and a USDT quote believed to
/// represent the same underlying asset. Computed fresh per request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolMatch {
    pub canonical_symbol: String,
    pub krw_symbol: String,
    pub global_symbol: String,
    pub krw_quote: Quote,
    pub global_quote: Quote,
    /// True whenever the two raw tickers differ textually.
    pub is_alias: bool,
}

/// Classification of an opportunity's legs by quote currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpportunityType {
    KrwToKrw,
    GlobalToGlobal,
    KrwToGlobal,
    GlobalToKrw,
}

impl OpportunityType {
    pub fn classify(buy: Currency, sell: Currency) -> OpportunityType {
        match (buy, sell) {
            (Currency::Krw, Currency::Krw) => OpportunityType::KrwToKrw,
            (Currency::Usdt, Currency::Usdt) => OpportunityType::GlobalToGlobal,
            (Currency::Krw, Currency::Usdt) => OpportunityType::KrwToGlobal,
            (Currency::Usdt, Currency::Krw) => OpportunityType::GlobalToKrw,
        }
    }

    pub fn parse(s: &str) -> Option<OpportunityType> {
        match s.trim().to_ascii_uppercase().as_str() {
            "KRW_TO_KRW" => Some(OpportunityType::KrwToKrw),
            "GLOBAL_TO_GLOBAL" => Some(OpportunityType::GlobalToGlobal),
            "KRW_TO_GLOBAL" => Some(OpportunityType::KrwToGlobal),
            "GLOBAL_TO_KRW" => Some(OpportunityType::GlobalToKrw),
            _ => None,
        }
    }
}

/// Transfer route implied by an opportunity's legs; drives wallet enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteType {
    /// Both legs on KRW venues.
    Domestic,
    /// Both legs on global venues.
    Global,
    /// One leg on each side.
    CrossBorder,
}

impl RouteType {
    pub fn classify(buy: Exchange, sell: Exchange) -> RouteType {
        match (buy.is_krw(), sell.is_krw()) {
            (true, true) => RouteType::Domestic,
            (false, false) => RouteType::Global,
            _ => RouteType::CrossBorder,
        }
    }
}

/// One directional trade idea within a single currency group.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbitrageOpportunity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OpportunityType,
    pub base: String,
    pub quote: Currency,
    pub buy_exchange: Exchange,
    pub sell_exchange: Exchange,
    pub buy_price: f64,
    pub sell_price: f64,
    /// `(sellPrice - buyPrice) / buyPrice * 100` at creation.
    pub gross_gap_pct: f64,
    /// Rough estimate: gross minus the configured flat fee. Not a cost model.
    pub net_profit_pct: f64,
    pub route_type: RouteType,
    /// Networks open for transfer on both legs; filled by enrichment.
    pub candidate_networks: Vec<String>,
    /// Whether the sell venue has a deposit address provisioned for the
    /// asset. `None` until enrichment has run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposit_address_ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fx: Option<FxRate>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume24h_usd: Option<f64>,
}

/// Direction of a cross-currency premium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PremiumKind {
    /// KRW price above the FX-converted global price.
    Kimchi,
    /// Global price above the FX-converted KRW price.
    Reverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeDirection {
    GlobalToKrw,
    KrwToGlobal,
}

/// One directional cross-currency trade idea, FX-normalized.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumOpportunity {
    pub id: String,
    pub kind: PremiumKind,
    pub canonical_symbol: String,
    pub krw_symbol: String,
    pub global_symbol: String,
    pub krw_exchange: Exchange,
    pub global_exchange: Exchange,
    pub krw_bid: f64,
    pub krw_ask: f64,
    pub global_bid: f64,
    pub global_ask: f64,
    /// Global bid converted at the FX bid (conservative when selling the
    /// global leg).
    pub global_bid_krw: f64,
    /// Global ask converted at the FX ask (conservative when buying the
    /// global leg).
    pub global_ask_krw: f64,
    pub fx_rate_bid: f64,
    pub fx_rate_ask: f64,
    pub fx_rate_mid: f64,
    pub fx_source: String,
    pub fx_stale: bool,
    pub fx_timestamp: DateTime<Utc>,
    pub gap_pct: f64,
    pub direction: TradeDirection,
    pub is_alias_pair: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_note: Option<String>,
    /// Human-readable derivation of `gapPct` for UI transparency.
    pub formula: String,
}

/// USDT/KRW conversion rate with bid/ask/mid and cache provenance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FxRate {
    pub source: String,
    pub bid: f64,
    pub ask: f64,
    /// `(bid + ask) / 2`.
    pub mid: f64,
    pub timestamp: DateTime<Utc>,
    /// True when the value survived past the fresh TTL because a re-fetch
    /// failed.
    pub stale: bool,
}

/// Admissibility thresholds applied post-calculation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSettings {
    pub min_volume_usd_24h: f64,
    pub exclude_if_volume_missing: bool,
    pub min_price_usd: f64,
    pub max_gap_pct: f64,
    pub max_spread_pct: f64,
    pub max_quote_age_seconds: i64,
    pub require_common_open_network: bool,
    pub require_deposit_address: bool,
    pub min_gap_pct: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_types: Option<Vec<OpportunityType>>,
    pub exclude_exchanges: Vec<Exchange>,
    /// Annotate failing opportunities instead of dropping them.
    pub debug_mode: bool,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            min_volume_usd_24h: 200_000.0,
            exclude_if_volume_missing: true,
            min_price_usd: 0.01,
            max_gap_pct: 50.0,
            max_spread_pct: 1.0,
            max_quote_age_seconds: 5,
            require_common_open_network: true,
            require_deposit_address: true,
            min_gap_pct: 0.5,
            allowed_types: None,
            exclude_exchanges: Vec::new(),
            debug_mode: false,
        }
    }
}

/// One reason an opportunity failed a filter predicate. Multiple filters may
/// each contribute one of these to the same opportunity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterExclusion {
    pub code: &'static str,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Flat fee assumption subtracted from gross gaps, in percent points.
    pub arbitrage_fee_pct: f64,
    /// Flat fee assumption for cross-currency routes, in percent points.
    pub premium_fee_pct: f64,
    pub fx_live_ttl_ms: u64,
    pub fx_fallback_ttl_ms: u64,
    pub quote_cache_ttl_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let port = env_parse("PORT", 8080u16)?;
        let arbitrage_fee_pct = env_parse("ARBITRAGE_FEE_PCT", 0.3f64)?;
        let premium_fee_pct = env_parse("PREMIUM_FEE_PCT", 0.35f64)?;
        let fx_live_ttl_ms = env_parse("FX_LIVE_TTL_MS", 2_000u64)?;
        let fx_fallback_ttl_ms = env_parse("FX_FALLBACK_TTL_MS", 60_000u64)?;
        let quote_cache_ttl_ms = env_parse("QUOTE_CACHE_TTL_MS", 2_000u64)?;

        if fx_fallback_ttl_ms < fx_live_ttl_ms {
            bail!("FX_FALLBACK_TTL_MS must be >= FX_LIVE_TTL_MS");
        }

        Ok(Self {
            port,
            arbitrage_fee_pct,
            premium_fee_pct,
            fx_live_ttl_ms,
            fx_fallback_ttl_ms,
            quote_cache_ttl_ms,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => bail!("invalid value for {}: {:?}", key, raw),
        },
        Err(_) => Ok(default),
    }
}
