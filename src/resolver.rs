// src/resolver.rs
//! Free text → canonical market-data id.
//!
//! Static table first (no network for majors), then the search endpoint.
//! Resolution never fails: on a miss the lowercased input is returned and the
//! subsequent detail lookup decides whether the coin exists.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::providers::MarketDataClient;
use crate::types::SearchCandidate;

/// Rank used for unranked search candidates so they sort last.
pub const UNRANKED: u32 = 10_000;

static COMMON_COINS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("btc", "bitcoin"),
        ("bitcoin", "bitcoin"),
        ("eth", "ethereum"),
        ("ethereum", "ethereum"),
        ("sol", "solana"),
        ("solana", "solana"),
        ("bnb", "binancecoin"),
        ("xrp", "ripple"),
        ("ripple", "ripple"),
        ("doge", "dogecoin"),
        ("dogecoin", "dogecoin"),
        ("ada", "cardano"),
        ("cardano", "cardano"),
        ("avax", "avalanche-2"),
        ("avalanche", "avalanche-2"),
        ("dot", "polkadot"),
        ("polkadot", "polkadot"),
        ("link", "chainlink"),
        ("chainlink", "chainlink"),
        ("matic", "matic-network"),
        ("polygon", "matic-network"),
        ("trx", "tron"),
        ("tron", "tron"),
        ("shib", "shiba-inu"),
        ("ltc", "litecoin"),
        ("litecoin", "litecoin"),
        ("usdt", "tether"),
        ("tether", "tether"),
        ("usdc", "usd-coin"),
        ("pepe", "pepe"),
    ])
});

/// Static lookup only; `None` when the symbol is not a listed major.
pub fn lookup_common(query: &str) -> Option<&'static str> {
    COMMON_COINS.get(query.trim().to_lowercase().as_str()).copied()
}

/// Pick the best candidate for `query` (already lowercased).
///
/// Candidates are ordered by market-cap rank; an exact symbol match beats an
/// exact name match, which beats the top-ranked candidate.
pub fn pick_candidate(query: &str, mut candidates: Vec<SearchCandidate>) -> Option<String> {
    candidates.sort_by_key(|c| c.market_cap_rank.unwrap_or(UNRANKED));
    let by_symbol = candidates
        .iter()
        .position(|c| c.symbol.eq_ignore_ascii_case(query));
    let by_name = || {
        candidates
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(query))
    };
    let idx = by_symbol
        .or_else(by_name)
        .or_else(|| (!candidates.is_empty()).then_some(0))?;
    Some(candidates.swap_remove(idx).id)
}

#[derive(Clone)]
pub struct SymbolResolver {
    market: MarketDataClient,
}

impl SymbolResolver {
    pub fn new(market: MarketDataClient) -> Self {
        Self { market }
    }

    pub async fn resolve(&self, query: &str) -> String {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return q;
        }
        if let Some(id) = lookup_common(&q) {
            return id.to_string();
        }
        match self.market.search(&q).await {
            Ok(candidates) => match pick_candidate(&q, candidates) {
                Some(id) => {
                    debug!(target: "resolver", query = %q, %id, "resolved via search");
                    id
                }
                None => {
                    debug!(target: "resolver", query = %q, "no search candidates");
                    q
                }
            },
            Err(e) => {
                warn!(target: "resolver", query = %q, error = %e, "search failed; using input");
                q
            }
        }
    }
}
