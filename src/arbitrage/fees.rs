//! Flat-fee profit adjustment.
//!
//! These rates are placeholder heuristics, not a cost model: real execution
//! costs depend on venue tier, withdrawal network and slippage. They exist
//! so ranked output is not dominated by gaps that a round trip would eat,
//! and they are configuration, not constants.

use crate::models::{Config, RouteType};

#[derive(Debug, Clone, Copy)]
pub struct FeeModel {
    /// Flat percentage-point deduction for same-currency routes.
    pub same_currency_fee_pct: f64,
    /// Flat percentage-point deduction for routes that cross KRW/USDT.
    pub cross_currency_fee_pct: f64,
}

impl Default for FeeModel {
    fn default() -> Self {
        Self {
            same_currency_fee_pct: 0.3,
            cross_currency_fee_pct: 0.35,
        }
    }
}

impl FeeModel {
    pub fn from_config(config: &Config) -> Self {
        Self {
            same_currency_fee_pct: config.arbitrage_fee_pct,
            cross_currency_fee_pct: config.premium_fee_pct,
        }
    }

    /// Gross gap minus the flat fee for the route.
    pub fn net_gap_pct(&self, gross_gap_pct: f64, route: RouteType) -> f64 {
        let fee = match route {
            RouteType::Domestic | RouteType::Global => self.same_currency_fee_pct,
            RouteType::CrossBorder => self.cross_currency_fee_pct,
        };
        gross_gap_pct - fee
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_is_gross_minus_flat_fee() {
        let fees = FeeModel::default();
        assert!((fees.net_gap_pct(1.0, RouteType::Domestic) - 0.7).abs() < 1e-12);
        assert!((fees.net_gap_pct(1.0, RouteType::Global) - 0.7).abs() < 1e-12);
        assert!((fees.net_gap_pct(1.0, RouteType::CrossBorder) - 0.65).abs() < 1e-12);
    }

    #[test]
    fn rates_are_configurable() {
        let fees = FeeModel {
            same_currency_fee_pct: 0.1,
            cross_currency_fee_pct: 0.2,
        };
        assert!((fees.net_gap_pct(0.5, RouteType::Domestic) - 0.4).abs() < 1e-12);
        assert!((fees.net_gap_pct(0.5, RouteType::CrossBorder) - 0.3).abs() < 1e-12);
    }
}
