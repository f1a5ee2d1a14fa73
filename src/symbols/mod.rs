//! Market-string normalization.
//!
//! Each venue encodes its markets differently; everything downstream works
//! on `{base, quote}` pairs, so the formats are parsed (and re-derivable)
//! here and nowhere else.

pub mod alias;

pub use alias::{match_symbols, SYMBOL_ALIASES};

use crate::models::{Currency, Exchange, Quote};

/// Parsed `{base, quote}` pair, upper-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMarket {
    pub base: String,
    pub quote: String,
}

/// Known quote-currency tickers for concatenated market strings, tried in
/// order (most specific first).
const QUOTE_SUFFIXES: &[&str] = &[
    "USDT", "USDC", "BUSD", "TUSD", "FDUSD", "BTC", "ETH", "BNB",
];

/// Parse a venue's raw market string. Returns `None` for malformed input;
/// callers skip such markets rather than erroring.
pub fn parse_market(exchange: Exchange, raw: &str) -> Option<ParsedMarket> {
    let raw = raw.trim().to_ascii_uppercase();
    if raw.is_empty() {
        return None;
    }

    match exchange {
        // BTC_KRW
        Exchange::Bithumb => split_pair(&raw, '_', false),
        // KRW-BTC
        Exchange::Upbit => split_pair(&raw, '-', true),
        // BTC-USDT
        Exchange::Okx => split_pair(&raw, '-', false),
        // BTCUSDT
        Exchange::Binance | Exchange::Bybit => strip_quote_suffix(&raw),
    }
}

/// Re-derive the raw market string for a venue from a parsed pair. Inverse
/// of `parse_market` up to case.
pub fn format_market(exchange: Exchange, base: &str, quote: &str) -> String {
    match exchange {
        Exchange::Bithumb => format!("{}_{}", base, quote),
        Exchange::Upbit => format!("{}-{}", quote, base),
        Exchange::Okx => format!("{}-{}", base, quote),
        Exchange::Binance | Exchange::Bybit => format!("{}{}", base, quote),
    }
}

fn split_pair(raw: &str, sep: char, quote_first: bool) -> Option<ParsedMarket> {
    let mut parts = raw.splitn(2, sep);
    let first = parts.next()?.to_string();
    let second = parts.next()?.to_string();
    if first.is_empty() || second.is_empty() {
        return None;
    }
    let (base, quote) = if quote_first {
        (second, first)
    } else {
        (first, second)
    };
    Some(ParsedMarket { base, quote })
}

fn strip_quote_suffix(raw: &str) -> Option<ParsedMarket> {
    for suffix in QUOTE_SUFFIXES {
        if let Some(base) = raw.strip_suffix(suffix) {
            if base.is_empty() {
                return None;
            }
            return Some(ParsedMarket {
                base: base.to_string(),
                quote: (*suffix).to_string(),
            });
        }
    }
    None
}

/// Quote currencies relevant to downstream matching. Everything else is
/// filtered out at normalization.
pub fn currency_of(quote: &str) -> Option<Currency> {
    match quote {
        "KRW" => Some(Currency::Krw),
        "USDT" => Some(Currency::Usdt),
        _ => None,
    }
}

pub fn filter_krw_markets(quotes: &[Quote]) -> Vec<Quote> {
    quotes
        .iter()
        .filter(|q| q.currency == Currency::Krw)
        .cloned()
        .collect()
}

pub fn filter_usdt_markets(quotes: &[Quote]) -> Vec<Quote> {
    quotes
        .iter()
        .filter(|q| q.currency == Currency::Usdt)
        .cloned()
        .collect()
}
