// src/portfolio.rs
//! Holdings valued against live market snapshots.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::providers::MarketDataClient;
use crate::types::CoinRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingSource {
    #[default]
    Manual,
    Wallet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioItem {
    /// Row id, unique within the portfolio.
    pub id: String,
    /// Market-data id used for pricing.
    pub coin_id: String,
    pub amount: f64,
    /// Cost basis per unit, USD.
    #[serde(default)]
    pub avg_buy_price: f64,
    #[serde(default)]
    pub source: HoldingSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionValue {
    pub id: String,
    pub coin_id: String,
    pub amount: f64,
    pub price: Option<f64>,
    pub value: f64,
    pub cost: f64,
    pub pnl: f64,
    pub change_24h_pct: Option<f64>,
    pub source: HoldingSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub positions: Vec<PositionValue>,
    pub total_value: f64,
    pub total_cost: f64,
    pub total_pnl: f64,
    /// Value-weighted 24h change of the priced positions.
    pub change_24h_pct: f64,
    /// Coin ids with no live price; they count as zero value.
    pub unpriced: Vec<String>,
}

fn normalize_id(id: &str) -> String {
    id.trim().to_lowercase()
}

/// Pure valuation step, split out from the network call.
///
/// Ids are matched case-insensitively; the market query lowercases them.
pub fn summarize(items: &[PortfolioItem], records: &[CoinRecord]) -> PortfolioSummary {
    let by_id: HashMap<String, &CoinRecord> =
        records.iter().map(|r| (normalize_id(&r.id), r)).collect();
    let mut out = PortfolioSummary::default();
    let mut unpriced = HashSet::new();
    let mut value_before = 0.0;

    for it in items {
        let rec = by_id.get(&normalize_id(&it.coin_id)).copied();
        let price = rec.map(|r| r.current_price);
        let value = price.map_or(0.0, |p| p * it.amount);
        let cost = it.avg_buy_price * it.amount;
        let change = rec.and_then(|r| r.price_change_percentage_24h);
        if price.is_none() && unpriced.insert(it.coin_id.clone()) {
            out.unpriced.push(it.coin_id.clone());
        }
        if let Some(pct) = change {
            // value 24h ago = value / (1 + pct/100)
            let denom = 1.0 + pct / 100.0;
            value_before += if denom > 0.0 { value / denom } else { value };
        } else {
            value_before += value;
        }

        out.total_value += value;
        out.total_cost += cost;
        out.positions.push(PositionValue {
            id: it.id.clone(),
            coin_id: it.coin_id.clone(),
            amount: it.amount,
            price,
            value,
            cost,
            pnl: value - cost,
            change_24h_pct: change,
            source: it.source,
        });
    }

    out.total_pnl = out.total_value - out.total_cost;
    out.change_24h_pct = if value_before > 0.0 {
        (out.total_value / value_before - 1.0) * 100.0
    } else {
        0.0
    };
    out
}

/// Price every holding with one watchlist query.
pub async fn value_portfolio(market: &MarketDataClient, items: &[PortfolioItem]) -> PortfolioSummary {
    let mut ids: Vec<String> = Vec::new();
    for it in items {
        let id = normalize_id(&it.coin_id);
        if !id.is_empty() && !ids.contains(&id) {
            ids.push(id);
        }
    }
    let records = market.coins_market_data(&ids).await;
    summarize(items, &records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, price: f64, change: Option<f64>) -> CoinRecord {
        CoinRecord {
            id: id.into(),
            current_price: price,
            price_change_percentage_24h: change,
            ..Default::default()
        }
    }

    fn holding(coin: &str, amount: f64, avg: f64) -> PortfolioItem {
        PortfolioItem {
            id: format!("row-{coin}"),
            coin_id: coin.into(),
            amount,
            avg_buy_price: avg,
            source: HoldingSource::Manual,
        }
    }

    #[test]
    fn values_priced_and_lists_unpriced() {
        let items = vec![holding("bitcoin", 2.0, 100.0), holding("ghost", 5.0, 1.0)];
        let s = summarize(&items, &[rec("bitcoin", 150.0, Some(50.0))]);
        assert_eq!(s.total_value, 300.0);
        assert_eq!(s.total_cost, 205.0);
        assert_eq!(s.total_pnl, 95.0);
        assert_eq!(s.unpriced, vec!["ghost".to_string()]);
        assert_eq!(s.positions[1].value, 0.0);
        // 300 now vs 200 a day ago
        assert!((s.change_24h_pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn mixed_case_ids_still_match_their_price() {
        let items = vec![holding(" Bitcoin ", 1.0, 10.0)];
        let s = summarize(&items, &[rec("bitcoin", 20.0, None)]);
        assert!(s.unpriced.is_empty());
        assert_eq!(s.total_value, 20.0);
        assert_eq!(s.positions[0].price, Some(20.0));
    }

    #[test]
    fn empty_portfolio_is_zero() {
        let s = summarize(&[], &[]);
        assert_eq!(s.total_value, 0.0);
        assert_eq!(s.change_24h_pct, 0.0);
        assert!(s.positions.is_empty());
    }
}
