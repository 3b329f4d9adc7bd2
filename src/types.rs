// src/types.rs
//! Normalized entities shared by adapters, the aggregation layer and the API.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::fetch::FetchError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
}

impl Language {
    /// Lenient parse for query strings; anything unknown is English.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "zh" | "zh-cn" | "zh-tw" | "cn" => Language::Zh,
            _ => Language::En,
        }
    }

    /// Language code expected by the news API.
    pub fn news_code(self) -> &'static str {
        match self {
            Language::En => "EN",
            Language::Zh => "ZH",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    /// Plain text, HTML stripped, length-capped.
    pub description: String,
    /// Source or author label.
    pub source: String,
    /// Epoch milliseconds, whatever format the upstream used.
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Upstream sends `null` for unknown numbers; treat it like a missing field.
fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Option::unwrap_or_default)
}

/// Market snapshot for one coin, as returned by the markets endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoinRecord {
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub symbol: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub image: String,
    #[serde(deserialize_with = "null_as_default")]
    pub current_price: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub market_cap: f64,
    pub market_cap_rank: Option<u32>,
    #[serde(deserialize_with = "null_as_default")]
    pub total_volume: f64,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,
    pub ath: Option<f64>,
    pub ath_change_percentage: Option<f64>,
    pub ath_date: Option<String>,
    pub atl: Option<f64>,
    pub atl_change_percentage: Option<f64>,
    pub atl_date: Option<String>,
    pub last_updated: Option<String>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
    pub fully_diluted_valuation: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub timestamp: i64,
    pub price: f64,
}

/// Global market aggregates; zeroed when the upstream is unavailable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalStats {
    pub total_market_cap: HashMap<String, f64>,
    pub total_volume: HashMap<String, f64>,
    pub market_cap_percentage: HashMap<String, f64>,
}

impl GlobalStats {
    pub fn zeroed() -> Self {
        let usd = |v: f64| HashMap::from([("usd".to_string(), v)]);
        Self {
            total_market_cap: usd(0.0),
            total_volume: usd(0.0),
            market_cap_percentage: HashMap::from([("btc".to_string(), 0.0)]),
        }
    }

    pub fn market_cap_usd(&self) -> f64 {
        self.total_market_cap.get("usd").copied().unwrap_or(0.0)
    }

    pub fn btc_dominance(&self) -> f64 {
        self.market_cap_percentage.get("btc").copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FearGreed {
    pub value: u32,
    pub classification: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub time_until_update_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub symbol: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub symbol: String,
    pub balance: f64,
}

/// A feed that yields normalized news items.
#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    async fn fetch_items(&self) -> Result<Vec<NewsItem>, FetchError>;
    fn name(&self) -> &str;
}
