// src/news/mod.rs
//! Multi-source news aggregation with a two-tier fallback.
//!
//! Primary sources for the language run in parallel; a failing source
//! contributes nothing. Below `min_items` unique items the fallback source is
//! merged in, and if that still leaves nothing the static placeholders are
//! served. Output is split into a flash stream and an illustrated stream.

pub mod placeholder;

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{Endpoints, FeedSource, NewsConfig};
use crate::fetch::FetchCore;
use crate::providers::coin_news::CryptoCompareSource;
use crate::providers::{RawXmlSource, RssJsonSource};
use crate::types::{Language, NewsItem, NewsSource};

pub use placeholder::{is_placeholder, placeholder_items};

/// Keep the first item of every title. Input order decides which copy wins.
pub fn dedup_by_title(items: Vec<NewsItem>) -> Vec<NewsItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|it| seen.insert(it.title.clone()))
        .collect()
}

/// Newest first; ties keep their relative order.
pub fn sort_newest_first(items: &mut [NewsItem]) {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewsFeed {
    /// Most recent items, order preserved.
    pub flash: Vec<NewsItem>,
    /// Items with an image first, backfilled with the rest when short.
    pub articles: Vec<NewsItem>,
    /// True when live sources produced nothing.
    pub placeholder: bool,
}

/// Split a sorted, deduplicated list into the two display streams.
pub fn partition(items: &[NewsItem], flash_n: usize, article_n: usize) -> (Vec<NewsItem>, Vec<NewsItem>) {
    let flash: Vec<NewsItem> = items.iter().take(flash_n).cloned().collect();

    let mut picked = vec![false; items.len()];
    let mut articles = Vec::with_capacity(article_n);
    for (i, it) in items.iter().enumerate() {
        if articles.len() >= article_n {
            break;
        }
        if it.image_url.is_some() {
            picked[i] = true;
            articles.push(it.clone());
        }
    }
    for (i, it) in items.iter().enumerate() {
        if articles.len() >= article_n {
            break;
        }
        if !picked[i] {
            articles.push(it.clone());
        }
    }
    (flash, articles)
}

/// Register descriptions for the news series with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(
        "news_source_errors_total",
        "News sources that failed during a fan-out."
    );
    describe_counter!(
        "news_placeholder_total",
        "Feeds served from static placeholders."
    );
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(describe_metrics);
}

/// Build the adapter behind one configured feed.
pub fn build_source(core: &FetchCore, endpoints: &Endpoints, src: &FeedSource) -> Arc<dyn NewsSource> {
    match src {
        FeedSource::RssJson { name, feed_url } => Arc::new(RssJsonSource::new(
            core.clone(),
            endpoints.rss2json_url.clone(),
            feed_url.clone(),
            name.clone(),
        )),
        FeedSource::RawXml { name, feed_url } => Arc::new(RawXmlSource::new(
            core.clone(),
            endpoints.raw_proxy_url.clone(),
            feed_url.clone(),
            name.clone(),
        )),
        FeedSource::CryptoCompare { name, lang } => Arc::new(CryptoCompareSource::new(
            core.clone(),
            endpoints.news_api_base.clone(),
            name.clone(),
            lang,
        )),
    }
}

#[derive(Clone)]
pub struct NewsAggregator {
    en: Vec<Arc<dyn NewsSource>>,
    zh: Vec<Arc<dyn NewsSource>>,
    fallback: Arc<dyn NewsSource>,
    min_items: usize,
    flash_count: usize,
    article_count: usize,
}

impl NewsAggregator {
    pub fn new(
        en: Vec<Arc<dyn NewsSource>>,
        zh: Vec<Arc<dyn NewsSource>>,
        fallback: Arc<dyn NewsSource>,
        settings: &NewsConfig,
    ) -> Self {
        ensure_metrics_described();
        Self {
            en,
            zh,
            fallback,
            min_items: settings.min_items,
            flash_count: settings.flash_count,
            article_count: settings.article_count,
        }
    }

    pub fn from_config(core: &FetchCore, endpoints: &Endpoints, settings: &NewsConfig) -> Self {
        let build = |list: &[FeedSource]| {
            list.iter()
                .map(|s| build_source(core, endpoints, s))
                .collect::<Vec<_>>()
        };
        Self::new(
            build(&settings.en),
            build(&settings.zh),
            build_source(core, endpoints, &settings.fallback),
            settings,
        )
    }

    fn sources_for(&self, lang: Language) -> &[Arc<dyn NewsSource>] {
        match lang {
            Language::En => &self.en,
            Language::Zh => &self.zh,
        }
    }

    /// Fetch every source concurrently; failures contribute zero items.
    async fn collect(sources: &[Arc<dyn NewsSource>]) -> Vec<NewsItem> {
        let results = join_all(sources.iter().map(|s| s.fetch_items())).await;
        let mut all = Vec::new();
        for (src, res) in sources.iter().zip(results) {
            match res {
                Ok(items) => {
                    debug!(target: "news", source = src.name(), count = items.len(), "source ok");
                    all.extend(items);
                }
                Err(e) => {
                    counter!("news_source_errors_total").increment(1);
                    warn!(target: "news", source = src.name(), error = %e, "source failed");
                }
            }
        }
        all
    }

    /// Never empty: live items, fallback items, or placeholders.
    pub async fn feed(&self, lang: Language) -> NewsFeed {
        let mut items = Self::collect(self.sources_for(lang)).await;
        sort_newest_first(&mut items);
        let mut items = dedup_by_title(items);

        if items.len() < self.min_items {
            info!(
                target: "news",
                have = items.len(),
                min = self.min_items,
                fallback = self.fallback.name(),
                "below minimum; consulting fallback"
            );
            items.extend(Self::collect(std::slice::from_ref(&self.fallback)).await);
            sort_newest_first(&mut items);
            items = dedup_by_title(items);
        }

        let placeholder = items.is_empty();
        if placeholder {
            counter!("news_placeholder_total").increment(1);
            warn!(target: "news", lang = lang.news_code(), "all news sources empty; serving placeholders");
            items = placeholder_items(lang, chrono::Utc::now().timestamp_millis());
        }

        let (flash, articles) = partition(&items, self.flash_count, self.article_count);
        NewsFeed {
            flash,
            articles,
            placeholder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, ts: i64, img: bool) -> NewsItem {
        NewsItem {
            title: title.into(),
            url: format!("https://n.test/{ts}"),
            description: String::new(),
            source: "T".into(),
            created_at: ts,
            image_url: img.then(|| format!("https://img.test/{ts}.png")),
        }
    }

    #[test]
    fn dedup_keeps_first_and_is_idempotent() {
        let list = vec![item("a", 3, false), item("b", 2, false), item("a", 1, true)];
        let once = dedup_by_title(list);
        assert_eq!(once.len(), 2);
        assert_eq!(once[0].created_at, 3);
        assert_eq!(dedup_by_title(once.clone()), once);
    }

    #[test]
    fn partition_prefers_images_then_backfills() {
        let items = vec![
            item("1", 6, false),
            item("2", 5, true),
            item("3", 4, false),
            item("4", 3, true),
            item("5", 2, false),
        ];
        let (flash, articles) = partition(&items, 3, 4);
        let titles = |v: &[NewsItem]| v.iter().map(|i| i.title.clone()).collect::<Vec<_>>();
        assert_eq!(titles(&flash), ["1", "2", "3"]);
        assert_eq!(titles(&articles), ["2", "4", "1", "3"]);
    }

    #[test]
    fn partition_caps_illustrated_stream() {
        let items: Vec<NewsItem> = (0..10).map(|i| item(&i.to_string(), 100 - i, true)).collect();
        let (flash, articles) = partition(&items, 8, 6);
        assert_eq!(flash.len(), 8);
        assert_eq!(articles.len(), 6);
        assert!(articles.iter().all(|a| a.image_url.is_some()));
    }

    #[test]
    fn sort_is_newest_first() {
        let mut v = vec![item("old", 1, false), item("new", 9, false), item("undated", 0, false)];
        sort_newest_first(&mut v);
        assert_eq!(v[0].title, "new");
        assert_eq!(v[2].title, "undated");
    }
}
