//! Wallet-status enrichment.
//!
//! Executing a cross-exchange trade means moving the asset from the buy
//! venue to the sell venue, which requires a transfer network open on both
//! sides and a deposit address provisioned at the destination. These
//! services attach that information to opportunity records; the filter
//! engine turns it into pass/fail decisions.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::models::{ArbitrageOpportunity, Exchange};

/// Per-(venue, asset) view of which transfer networks are open for both
/// deposit and withdrawal. `None` means the status is unknown for that
/// venue/asset, which downstream treats as closed.
pub trait NetworkStatusProvider: Send + Sync {
    fn open_networks(&self, exchange: Exchange, symbol: &str) -> Option<Vec<String>>;
}

/// Whether a deposit address has been provisioned for an asset on a venue.
pub trait DepositAddressBook: Send + Sync {
    fn has_address(&self, exchange: Exchange, symbol: &str) -> bool;
}

/// Snapshot-backed network table. Production data comes from periodic scans
/// of each venue's currency status endpoints; the defaults cover majors
/// whose primary network is open on every venue essentially always.
pub struct StaticNetworkTable {
    map: HashMap<(Exchange, String), Vec<String>>,
}

const DEFAULT_NETWORKS: &[(&str, &[&str])] = &[
    ("BTC", &["BTC"]),
    ("ETH", &["ERC20"]),
    ("XRP", &["XRP"]),
    ("SOL", &["SOL"]),
    ("DOGE", &["DOGE"]),
    ("TRX", &["TRC20"]),
];

impl StaticNetworkTable {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn with_defaults(exchanges: &[Exchange]) -> Self {
        let mut table = Self::new();
        for exchange in exchanges {
            for (symbol, networks) in DEFAULT_NETWORKS {
                table.insert(
                    *exchange,
                    symbol,
                    networks.iter().map(|n| n.to_string()).collect(),
                );
            }
        }
        table
    }

    pub fn insert(&mut self, exchange: Exchange, symbol: &str, networks: Vec<String>) {
        self.map
            .insert((exchange, symbol.to_ascii_uppercase()), networks);
    }
}

impl Default for StaticNetworkTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkStatusProvider for StaticNetworkTable {
    fn open_networks(&self, exchange: Exchange, symbol: &str) -> Option<Vec<String>> {
        self.map
            .get(&(exchange, symbol.to_ascii_uppercase()))
            .cloned()
    }
}

/// In-memory address book seeded from configuration.
pub struct InMemoryAddressBook {
    entries: HashSet<(Exchange, String)>,
}

impl InMemoryAddressBook {
    pub fn new() -> Self {
        Self {
            entries: HashSet::new(),
        }
    }

    /// Parse `DEPOSIT_ADDRESS_BOOK`, a comma-separated `exchange:symbol`
    /// list. Unrecognized entries are ignored.
    pub fn from_env() -> Self {
        let mut book = Self::new();
        if let Ok(raw) = std::env::var("DEPOSIT_ADDRESS_BOOK") {
            for part in raw.split(',') {
                let mut fields = part.trim().splitn(2, ':');
                let (Some(exchange), Some(symbol)) = (fields.next(), fields.next()) else {
                    continue;
                };
                if let Some(exchange) = Exchange::parse(exchange) {
                    book.insert(exchange, symbol);
                }
            }
        }
        book
    }

    pub fn insert(&mut self, exchange: Exchange, symbol: &str) {
        self.entries.insert((exchange, symbol.to_ascii_uppercase()));
    }
}

impl Default for InMemoryAddressBook {
    fn default() -> Self {
        Self::new()
    }
}

impl DepositAddressBook for InMemoryAddressBook {
    fn has_address(&self, exchange: Exchange, symbol: &str) -> bool {
        self.entries
            .contains(&(exchange, symbol.to_ascii_uppercase()))
    }
}

pub struct EnrichmentService {
    networks: Arc<dyn NetworkStatusProvider>,
    addresses: Arc<dyn DepositAddressBook>,
}

impl EnrichmentService {
    pub fn new(
        networks: Arc<dyn NetworkStatusProvider>,
        addresses: Arc<dyn DepositAddressBook>,
    ) -> Self {
        Self {
            networks,
            addresses,
        }
    }

    /// Attach candidate networks and deposit-address presence to each
    /// record. The candidate set is the intersection of both legs' open
    /// networks, in the buy side's order; an unknown side intersects to
    /// empty. The deposit address matters at the sell venue, where the
    /// bought asset has to land.
    pub fn enrich(&self, opportunities: &mut [ArbitrageOpportunity]) {
        for opp in opportunities {
            let buy_side = self.networks.open_networks(opp.buy_exchange, &opp.base);
            let sell_side = self.networks.open_networks(opp.sell_exchange, &opp.base);
            opp.candidate_networks = match (buy_side, sell_side) {
                (Some(buy), Some(sell)) => {
                    let sell: HashSet<String> = sell.into_iter().collect();
                    buy.into_iter().filter(|n| sell.contains(n)).collect()
                }
                _ => Vec::new(),
            };
            opp.deposit_address_ok =
                Some(self.addresses.has_address(opp.sell_exchange, &opp.base));
        }
    }
}
