//! KimpBot Backend Library
//!
//! Aggregates live bid/ask quotes from two KRW venues and three USDT
//! venues, then computes same-currency arbitrage gaps and FX-normalized
//! cross-currency premiums over the matched symbol set.

pub mod api;
pub mod arbitrage;
pub mod cache;
pub mod connectors;
pub mod enrichment;
pub mod filters;
pub mod fx;
pub mod models;
pub mod premium;
pub mod symbols;
