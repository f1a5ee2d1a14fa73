//! Cross-market symbol matching.
//!
//! Most assets trade under the same ticker everywhere and match by string
//! equality. A handful are listed under a different ticker on the KRW
//! venues than on the global ones; those go through the alias table. No
//! fuzzy matching is attempted; an unmapped divergence simply produces no
//! match.

use std::collections::HashMap;

use crate::models::{Quote, SymbolMatch};

/// One divergent listing: the asset's canonical id, the ticker the KRW
/// venues use, and the ticker the global venues use.
#[derive(Debug, Clone, Copy)]
pub struct AliasEntry {
    pub canonical: &'static str,
    pub krw: &'static str,
    pub global: &'static str,
}

/// Assets whose ticker differs between the KRW venues and the global ones.
/// Upbit's TON is Tokamak Network, which global venues list as TOKAMAK
/// (their TON is Toncoin, a different asset). FirmaChain renamed to FCT2
/// globally while the KRW listings kept FCT.
pub const SYMBOL_ALIASES: &[AliasEntry] = &[
    AliasEntry {
        canonical: "TOKAMAK",
        krw: "TON",
        global: "TOKAMAK",
    },
    AliasEntry {
        canonical: "FCT2",
        krw: "FCT",
        global: "FCT2",
    },
];

/// Canonical id for a KRW-side ticker: alias table lookup, else the ticker
/// itself.
pub fn canonical_for_krw(ticker: &str) -> &str {
    SYMBOL_ALIASES
        .iter()
        .find(|e| e.krw == ticker)
        .map(|e| e.canonical)
        .unwrap_or(ticker)
}

/// Canonical id for a global-side ticker.
pub fn canonical_for_global(ticker: &str) -> &str {
    SYMBOL_ALIASES
        .iter()
        .find(|e| e.global == ticker)
        .map(|e| e.canonical)
        .unwrap_or(ticker)
}

/// Pair each KRW quote with the global quote for the same underlying asset.
/// Global quotes are indexed by canonical id, first-found wins; KRW quotes
/// without a counterpart are silently excluded.
pub fn match_symbols(krw_quotes: &[Quote], global_quotes: &[Quote]) -> Vec<SymbolMatch> {
    let mut by_canonical: HashMap<&str, &Quote> = HashMap::with_capacity(global_quotes.len());
    for quote in global_quotes {
        by_canonical
            .entry(canonical_for_global(&quote.symbol))
            .or_insert(quote);
    }

    let mut matches = Vec::new();
    for krw_quote in krw_quotes {
        let canonical = canonical_for_krw(&krw_quote.symbol);
        let Some(global_quote) = by_canonical.get(canonical) else {
            continue;
        };
        matches.push(SymbolMatch {
            canonical_symbol: canonical.to_string(),
            krw_symbol: krw_quote.symbol.clone(),
            global_symbol: global_quote.symbol.clone(),
            krw_quote: krw_quote.clone(),
            global_quote: (*global_quote).clone(),
            is_alias: krw_quote.symbol != global_quote.symbol,
        });
    }
    matches
}
