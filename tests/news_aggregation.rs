// tests/news_aggregation.rs
//
// Fan-out, fallback ladder and stream partitioning of the news aggregator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use market_pulse::config::{Endpoints, FeedSource, NewsConfig};
use market_pulse::fetch::{FetchCore, FetchError, MockTransport};
use market_pulse::news::{dedup_by_title, is_placeholder, NewsAggregator};
use market_pulse::providers::RawXmlSource;
use market_pulse::types::{Language, NewsItem, NewsSource};

struct StubSource {
    name: String,
    result: Result<Vec<NewsItem>, FetchError>,
    calls: AtomicUsize,
}

impl StubSource {
    fn ok(name: &str, items: Vec<NewsItem>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            result: Ok(items),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            result: Err(FetchError::Transient("down".into())),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl NewsSource for StubSource {
    async fn fetch_items(&self) -> Result<Vec<NewsItem>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn sources(list: Vec<Arc<StubSource>>) -> Vec<Arc<dyn NewsSource>> {
    list.into_iter().map(|s| s as Arc<dyn NewsSource>).collect()
}

fn item(title: &str, ts: i64, img: bool) -> NewsItem {
    NewsItem {
        title: title.into(),
        url: format!("https://n.test/{title}"),
        description: "d".into(),
        source: "S".into(),
        created_at: ts,
        image_url: img.then(|| format!("https://img.test/{title}.png")),
    }
}

fn settings() -> NewsConfig {
    NewsConfig {
        min_items: 3,
        flash_count: 4,
        article_count: 2,
        ..NewsConfig::default()
    }
}

#[tokio::test]
async fn total_outage_serves_placeholders() {
    let fallback = StubSource::failing("fallback");
    let agg = NewsAggregator::new(
        sources(vec![StubSource::failing("a"), StubSource::ok("b", vec![])]),
        vec![],
        fallback.clone(),
        &settings(),
    );

    let feed = agg.feed(Language::En).await;
    assert!(feed.placeholder);
    assert!(!feed.flash.is_empty());
    assert!(!feed.articles.is_empty());
    assert!(feed.flash.iter().all(is_placeholder));
    assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failing_source_contributes_nothing_and_fallback_tops_up() {
    let primary = StubSource::ok("p", vec![item("a", 30, false), item("b", 20, true)]);
    let fallback = StubSource::ok("f", vec![item("b", 25, false), item("c", 10, true), item("d", 5, false)]);
    let agg = NewsAggregator::new(
        sources(vec![primary, StubSource::failing("down")]),
        vec![],
        fallback.clone(),
        &settings(),
    );

    let feed = agg.feed(Language::En).await;
    assert!(!feed.placeholder);
    let titles: Vec<&str> = feed.flash.iter().map(|i| i.title.as_str()).collect();
    // newest copy of "b" wins after the merge
    assert_eq!(titles, ["a", "b", "c", "d"]);
    assert_eq!(feed.flash[1].created_at, 25);
    assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);

    let art: Vec<&str> = feed.articles.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(art, ["c", "a"]);
}

#[tokio::test]
async fn enough_primary_items_skip_the_fallback() {
    let primary = StubSource::ok(
        "p",
        vec![item("1", 1, true), item("2", 2, true), item("3", 3, false), item("3", 3, false)],
    );
    let fallback = StubSource::ok("f", vec![item("x", 99, true)]);
    let agg = NewsAggregator::new(sources(vec![primary]), vec![], fallback.clone(), &settings());

    let feed = agg.feed(Language::En).await;
    assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    assert_eq!(feed.flash.len(), 3);
    assert_eq!(feed.flash[0].title, "3");
    assert_eq!(dedup_by_title(feed.flash.clone()), feed.flash);
}

#[tokio::test]
async fn language_selects_the_source_set() {
    let en = StubSource::ok("en", vec![item("english", 1, false)]);
    let zh = StubSource::ok("zh", vec![item("中文", 1, false)]);
    let agg = NewsAggregator::new(
        sources(vec![en.clone()]),
        sources(vec![zh.clone()]),
        StubSource::ok("f", vec![]),
        &settings(),
    );

    let feed = agg.feed(Language::Zh).await;
    assert_eq!(feed.flash[0].title, "中文");
    assert_eq!(en.calls.load(Ordering::SeqCst), 0);
    assert_eq!(zh.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn configured_sources_run_over_the_fetch_core() {
    let mock = Arc::new(MockTransport::new());
    let core = FetchCore::with_transport(mock.clone());
    let endpoints = Endpoints {
        rss2json_url: "https://rss2json.test/api.json".into(),
        raw_proxy_url: "https://raw.test/raw".into(),
        news_api_base: "https://cc.test/news/".into(),
        ..Endpoints::default()
    };
    let cfg = NewsConfig {
        min_items: 10,
        flash_count: 8,
        article_count: 6,
        en: vec![
            FeedSource::RssJson {
                name: "JsonFeed".into(),
                feed_url: "https://json.feed/rss".into(),
            },
            FeedSource::RawXml {
                name: "XmlFeed".into(),
                feed_url: "https://xml.feed/rss".into(),
            },
        ],
        zh: vec![],
        fallback: FeedSource::CryptoCompare {
            name: "CC".into(),
            lang: "EN".into(),
        },
    };

    mock.respond(
        "rss2json.test",
        200,
        r#"{"status": "ok", "items": [{"title": "From JSON", "link": "https://j/1",
            "pubDate": "2024-01-01 10:00:00", "thumbnail": "https://img/j.png"}]}"#,
    );
    mock.respond(
        "raw.test",
        200,
        r#"<rss><channel><item><title>From XML</title><link>https://x/1</link>
            <pubDate>Mon, 01 Jan 2024 11:00:00 +0000</pubDate></item></channel></rss>"#,
    );
    mock.respond(
        "cc.test",
        200,
        r#"{"Data": [{"title": "From API", "url": "https://a/1", "body": "", "source": "cc",
            "published_on": 1704110400}]}"#,
    );

    let agg = NewsAggregator::from_config(&core, &endpoints, &cfg);
    let feed = agg.feed(Language::En).await;

    let titles: Vec<&str> = feed.flash.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, ["From API", "From XML", "From JSON"]);
    assert_eq!(feed.articles[0].title, "From JSON");
    assert!(mock.calls().iter().any(|u| u.contains("rss_url=https%3A%2F%2Fjson.feed%2Frss")));
    assert!(mock.calls().iter().any(|u| u.contains("url=https%3A%2F%2Fxml.feed%2Frss&_=")));
}

#[tokio::test(start_paused = true)]
async fn raw_xml_feed_is_fetched_live_every_time() {
    let mock = Arc::new(MockTransport::new());
    let core = FetchCore::with_transport(mock.clone());
    mock.respond(
        "raw.test",
        200,
        r#"<rss><channel><item><title>Live</title><link>https://x/1</link></item></channel></rss>"#,
    );
    let source = RawXmlSource::new(core.clone(), "https://raw.test/raw", "https://xml.feed/rss", "Xml");

    let first = source.fetch_items().await.unwrap();
    let second = source.fetch_items().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first[0].title, "Live");
    assert_eq!(mock.call_count(), 2);
    assert!(core.cache().is_empty());
    assert!(core.inflight().is_empty());
}
