// src/config/mod.rs
//! Runtime configuration: upstream endpoints, cache/backoff tuning, news
//! thresholds and feed lists.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fetch::BackoffPolicy;

pub const ENV_CONFIG_PATH: &str = "FEED_CONFIG_PATH";
pub const ENV_API_KEY: &str = "COINGECKO_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Market-data API key. `"ENV"` (or absent) means: read `$COINGECKO_API_KEY`.
    pub api_key: Option<String>,
    pub cache: CacheConfig,
    pub backoff: BackoffPolicy,
    pub http: HttpConfig,
    pub endpoints: Endpoints,
    pub news: NewsConfig,
    /// Where user preferences are persisted.
    pub prefs_path: PathBuf,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            cache: CacheConfig::default(),
            backoff: BackoffPolicy::default(),
            http: HttpConfig::default(),
            endpoints: Endpoints::default(),
            news: NewsConfig::default(),
            prefs_path: PathBuf::from("data/preferences.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 120 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            connect_timeout_secs: 4,
            user_agent: "market-pulse/0.1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub market_base: String,
    pub fear_greed_url: String,
    pub news_api_base: String,
    /// RSS-to-JSON conversion proxy; takes the feed as `rss_url`.
    pub rss2json_url: String,
    /// Raw pass-through proxy; takes the target as `url`.
    pub raw_proxy_url: String,
    pub balance_base: String,
    pub balance_api_key: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            market_base: "https://api.coingecko.com/api/v3".to_string(),
            fear_greed_url: "https://api.alternative.me/fng/?limit=1".to_string(),
            news_api_base: "https://min-api.cryptocompare.com/data/v2/news/".to_string(),
            rss2json_url: "https://api.rss2json.com/v1/api.json".to_string(),
            raw_proxy_url: "https://api.allorigins.win/raw".to_string(),
            balance_base: "https://api.ethplorer.io".to_string(),
            balance_api_key: "freekey".to_string(),
        }
    }
}

/// One upstream news feed and the adapter that reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedSource {
    RssJson { name: String, feed_url: String },
    RawXml { name: String, feed_url: String },
    CryptoCompare { name: String, lang: String },
}

impl FeedSource {
    pub fn name(&self) -> &str {
        match self {
            FeedSource::RssJson { name, .. }
            | FeedSource::RawXml { name, .. }
            | FeedSource::CryptoCompare { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    /// Below this many unique items the fallback source is consulted.
    pub min_items: usize,
    pub flash_count: usize,
    pub article_count: usize,
    pub en: Vec<FeedSource>,
    pub zh: Vec<FeedSource>,
    pub fallback: FeedSource,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            min_items: 6,
            flash_count: 8,
            article_count: 6,
            en: vec![
                FeedSource::RssJson {
                    name: "CoinDesk".into(),
                    feed_url: "https://www.coindesk.com/arc/outboundfeeds/rss/".into(),
                },
                FeedSource::RssJson {
                    name: "Cointelegraph".into(),
                    feed_url: "https://cointelegraph.com/rss".into(),
                },
                FeedSource::RawXml {
                    name: "Decrypt".into(),
                    feed_url: "https://decrypt.co/feed".into(),
                },
            ],
            zh: vec![
                FeedSource::RssJson {
                    name: "PANews".into(),
                    feed_url: "https://rss.panewslab.com/zh/tvsq/rss".into(),
                },
                FeedSource::CryptoCompare {
                    name: "CryptoCompare ZH".into(),
                    lang: "ZH".into(),
                },
            ],
            fallback: FeedSource::CryptoCompare {
                name: "CryptoCompare".into(),
                lang: "EN".into(),
            },
        }
    }
}

impl FeedConfig {
    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading feed config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, ext.as_str())?;
        Ok(cfg.finish())
    }

    /// Load using env var + fallbacks:
    /// 1) $FEED_CONFIG_PATH
    /// 2) config/feed.toml
    /// 3) config/feed.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            } else {
                return Err(anyhow!("FEED_CONFIG_PATH points to non-existent path"));
            }
        }
        let toml_p = PathBuf::from("config/feed.toml");
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from("config/feed.json");
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        Ok(Self::from_env())
    }

    /// Built-in defaults plus the API key from the environment.
    pub fn from_env() -> Self {
        Self::default().finish()
    }

    /// Resolve the API key and sanitize numeric fields.
    fn finish(mut self) -> Self {
        let from_file = self
            .api_key
            .take()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        self.api_key = match from_file {
            Some(k) if !k.eq_ignore_ascii_case("env") => Some(k),
            _ => std::env::var(ENV_API_KEY)
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
        };

        let d = Self::default();
        if self.cache.ttl_secs == 0 {
            self.cache.ttl_secs = d.cache.ttl_secs;
        }
        self.backoff = self.backoff.sanitized();
        if self.http.timeout_secs == 0 {
            self.http.timeout_secs = d.http.timeout_secs;
        }
        if self.http.connect_timeout_secs == 0 {
            self.http.connect_timeout_secs = d.http.connect_timeout_secs;
        }
        if self.news.flash_count == 0 {
            self.news.flash_count = d.news.flash_count;
        }
        if self.news.article_count == 0 {
            self.news.article_count = d.news.article_count;
        }
        self
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<FeedConfig> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("parsing feed config json");
    }
    match toml::from_str::<FeedConfig>(s) {
        Ok(cfg) => Ok(cfg),
        Err(toml_err) => serde_json::from_str(s)
            .map_err(|_| anyhow!("unsupported feed config format: {toml_err}")),
    }
}
