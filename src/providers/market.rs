// src/providers/market.rs
//! Market-data REST adapter (CoinGecko-shaped API).

use serde::Deserialize;
use tracing::warn;

use crate::fetch::{FetchCore, FetchError, FetchRequest};
use crate::types::{ChartPoint, CoinRecord, SearchCandidate};

/// Watchlist queries are capped at this many ids per call.
pub const MAX_IDS_PER_QUERY: usize = 50;

/// Ecosystem id lists behind the category tabs.
pub fn category_ids(category: &str) -> &'static str {
    match category {
        "eth" => "ethereum,shiba-inu,uniswap,pepe",
        "sol" => "solana,render-token,bonk,jupiter-exchange-solana",
        "bsc" => "binancecoin,pancakeswap-token,trust-wallet-token,cake-monster",
        "arb" => "arbitrum,chainlink,lido-dao,gmx",
        _ => "bitcoin,ethereum,binancecoin,solana",
    }
}

#[derive(Clone)]
pub struct MarketDataClient {
    core: FetchCore,
    base: String,
}

impl MarketDataClient {
    pub fn new(core: FetchCore, base: impl Into<String>) -> Self {
        Self {
            core,
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    fn markets_url(&self, ids: &str, per_page: usize) -> String {
        format!(
            "{}/coins/markets?vs_currency=usd&ids={}&order=market_cap_desc&per_page={}&page=1&sparkline=false",
            self.base, ids, per_page
        )
    }

    async fn markets(&self, url: String, retries: u32, backoff_ms: u64) -> Result<Vec<CoinRecord>, FetchError> {
        let req = FetchRequest::json(url)
            .retries(retries, backoff_ms)
            .authenticated();
        let v = self.core.fetch_json(req).await?;
        serde_json::from_value(v).map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// Snapshot for one coin id.
    ///
    /// This is the one adapter call that propagates errors: an unknown id
    /// (HTTP 404 or an empty list) is `NotFound`, never a zeroed record.
    pub async fn coin_detail(&self, id: &str) -> Result<CoinRecord, FetchError> {
        let id = id.trim().to_lowercase();
        if id.is_empty() {
            return Err(FetchError::NotFound(String::new()));
        }
        let url = self.markets_url(&urlencoding::encode(&id), 1);
        let mut list = self.markets(url, 3, 1000).await?;
        if list.is_empty() {
            return Err(FetchError::NotFound(id));
        }
        Ok(list.swap_remove(0))
    }

    /// Snapshots for up to 50 ids; empty on failure.
    pub async fn coins_market_data(&self, ids: &[String]) -> Vec<CoinRecord> {
        let ids: Vec<String> = ids
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .take(MAX_IDS_PER_QUERY)
            .collect();
        if ids.is_empty() {
            return Vec::new();
        }
        let url = self.markets_url(&ids.join(","), MAX_IDS_PER_QUERY);
        match self.markets(url, 3, 1500).await {
            Ok(v) => v,
            Err(e) => {
                warn!(target: "market", error = %e, "watchlist fetch failed");
                Vec::new()
            }
        }
    }

    /// Top coins of a category tab; unknown categories use `all`.
    pub async fn trending(&self, category: &str) -> Vec<CoinRecord> {
        let url = self.markets_url(category_ids(category), 10);
        match self.markets(url, 3, 1500).await {
            Ok(v) => v,
            Err(e) => {
                warn!(target: "market", category, error = %e, "trending fetch failed");
                Vec::new()
            }
        }
    }

    /// Price series over the last `days`; empty on failure.
    pub async fn history(&self, id: &str, days: u32) -> Vec<ChartPoint> {
        #[derive(Deserialize)]
        struct MarketChart {
            #[serde(default)]
            prices: Vec<(f64, f64)>,
        }

        let url = format!(
            "{}/coins/{}/market_chart?vs_currency=usd&days={}",
            self.base,
            urlencoding::encode(&id.trim().to_lowercase()),
            days.max(1)
        );
        let req = FetchRequest::json(url).retries(2, 2000).authenticated();
        let chart = self
            .core
            .fetch_json(req)
            .await
            .and_then(|v| {
                serde_json::from_value::<MarketChart>(v).map_err(|e| FetchError::Decode(e.to_string()))
            });
        match chart {
            Ok(c) => c
                .prices
                .into_iter()
                .map(|(ts, price)| ChartPoint {
                    timestamp: ts as i64,
                    price,
                })
                .collect(),
            Err(e) => {
                warn!(target: "market", id, error = %e, "history fetch failed");
                Vec::new()
            }
        }
    }

    /// Free-text search; candidates in upstream order.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>, FetchError> {
        #[derive(Deserialize)]
        struct SearchResp {
            #[serde(default)]
            coins: Vec<SearchCandidate>,
        }

        let url = format!(
            "{}/search?query={}",
            self.base,
            urlencoding::encode(query.trim())
        );
        let req = FetchRequest::json(url).retries(2, 1000).authenticated();
        let v = self.core.fetch_json(req).await?;
        serde_json::from_value::<SearchResp>(v)
            .map(|r| r.coins)
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_category_uses_majors() {
        assert_eq!(category_ids("nope"), category_ids("all"));
        assert!(category_ids("sol").starts_with("solana"));
    }
}
