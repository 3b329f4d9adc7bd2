// src/providers/coin_news.rs
//! News-API adapter (CryptoCompare-shaped): per-coin news and a general
//! feed usable as an aggregation source.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::fetch::{FetchCore, FetchError, FetchRequest};
use crate::providers::{clean_title, snippet, unix_seconds_to_ms};
use crate::types::{Language, NewsItem, NewsSource};

/// Items shown per coin.
pub const COIN_NEWS_LIMIT: usize = 5;

#[derive(Debug, Deserialize)]
struct ApiArticle {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    published_on: i64,
    #[serde(default)]
    imageurl: Option<String>,
    #[serde(default)]
    source_info: Option<SourceInfo>,
}

#[derive(Debug, Deserialize)]
struct SourceInfo {
    name: Option<String>,
}

fn news_url(base: &str, lang: &str, category: Option<&str>) -> String {
    match category {
        Some(c) => format!("{base}?lang={lang}&categories={}", urlencoding::encode(c)),
        None => format!("{base}?lang={lang}"),
    }
}

/// Articles from the `Data` array. A missing or non-array `Data` (the API
/// returns an object on errors) yields an empty list.
fn parse_articles(v: Value) -> Vec<NewsItem> {
    let Some(Value::Array(data)) = v.get("Data").cloned() else {
        return Vec::new();
    };
    data.into_iter()
        .filter_map(|raw| serde_json::from_value::<ApiArticle>(raw).ok())
        .filter(|a| !a.title.trim().is_empty())
        .map(|a| {
            let source = a
                .source_info
                .and_then(|s| s.name)
                .filter(|n| !n.trim().is_empty())
                .unwrap_or(a.source);
            NewsItem {
                title: clean_title(&a.title),
                url: a.url,
                description: snippet(&a.body),
                source,
                created_at: unix_seconds_to_ms(a.published_on),
                image_url: a.imageurl.filter(|u| u.starts_with("http")),
            }
        })
        .collect()
}

async fn fetch_articles(core: &FetchCore, url: String) -> Result<Vec<NewsItem>, FetchError> {
    // News is secondary: one attempt, cached.
    let req = FetchRequest::json(url).retries(1, 1000);
    core.fetch_json(req).await.map(parse_articles)
}

/// Static link cards for a symbol when no live news is available.
pub fn link_cards(symbol: &str, now_ms: i64) -> Vec<NewsItem> {
    let upper = symbol.trim().to_uppercase();
    let lower = symbol.trim().to_lowercase();
    vec![
        NewsItem {
            title: format!("{upper} Market Updates - Google News"),
            url: format!("https://www.google.com/search?q={upper}+crypto+news&tbm=nws"),
            description: format!(
                "Click to view the latest aggregated news stories for {upper} on Google News."
            ),
            source: "Google News".into(),
            created_at: now_ms,
            image_url: None,
        },
        NewsItem {
            title: format!("{upper} Community Discussion"),
            url: format!("https://twitter.com/search?q=%24{upper}&src=typed_query"),
            description: format!("See what the community is saying about ${upper} on X (Twitter)."),
            source: "X (Twitter)".into(),
            created_at: now_ms,
            image_url: None,
        },
        NewsItem {
            title: format!("{upper} Price & Analysis"),
            url: format!("https://www.coingecko.com/en/coins/{lower}"),
            description: "Deep dive into on-chain data and price action on CoinGecko.".into(),
            source: "CoinGecko".into(),
            created_at: now_ms,
            image_url: None,
        },
    ]
}

#[derive(Clone)]
pub struct CoinNewsClient {
    core: FetchCore,
    base: String,
}

impl CoinNewsClient {
    pub fn new(core: FetchCore, base: impl Into<String>) -> Self {
        Self {
            core,
            base: base.into(),
        }
    }

    /// Latest news for `symbol`; never empty.
    ///
    /// Chinese requests fall back to English; if both are empty or fail the
    /// result is a set of static link cards for the symbol.
    pub async fn coin_news(&self, symbol: &str, lang: Language) -> Vec<NewsItem> {
        let category = symbol.trim().to_uppercase();
        let mut langs = vec![lang];
        if lang != Language::En {
            langs.push(Language::En);
        }
        for l in langs {
            let url = news_url(&self.base, l.news_code(), Some(&category));
            match fetch_articles(&self.core, url).await {
                Ok(items) if !items.is_empty() => {
                    return items.into_iter().take(COIN_NEWS_LIMIT).collect();
                }
                Ok(_) => debug!(target: "news", symbol = %category, lang = l.news_code(), "no coin news"),
                Err(e) => warn!(target: "news", symbol = %category, error = %e, "coin news failed"),
            }
        }
        link_cards(&category, chrono::Utc::now().timestamp_millis())
    }
}

/// General (uncategorized) feed from the news API.
pub struct CryptoCompareSource {
    core: FetchCore,
    base: String,
    name: String,
    lang: String,
}

impl CryptoCompareSource {
    pub fn new(core: FetchCore, base: impl Into<String>, name: impl Into<String>, lang: &str) -> Self {
        Self {
            core,
            base: base.into(),
            name: name.into(),
            lang: lang.trim().to_uppercase(),
        }
    }
}

#[async_trait]
impl NewsSource for CryptoCompareSource {
    async fn fetch_items(&self) -> Result<Vec<NewsItem>, FetchError> {
        fetch_articles(&self.core, news_url(&self.base, &self.lang, None)).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
