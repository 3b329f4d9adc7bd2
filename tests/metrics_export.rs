// tests/metrics_export.rs
//
// Prometheus exposition of the fetch and news series. One test per binary:
// the recorder is process-global.

use std::sync::Arc;

use market_pulse::config::{Endpoints, NewsConfig};
use market_pulse::fetch::{FetchCore, FetchRequest, MockTransport};
use market_pulse::metrics::Metrics;
use market_pulse::news::NewsAggregator;
use market_pulse::types::Language;

#[tokio::test(start_paused = true)]
async fn series_built_before_the_recorder_keep_their_help_text() {
    // Wired before the recorder exists, as a slow boot would.
    let mock = Arc::new(MockTransport::new());
    let core = FetchCore::with_transport(mock.clone());
    let news = NewsAggregator::from_config(&core, &Endpoints::default(), &NewsConfig::default());

    let metrics = Metrics::init(120_000).expect("recorder installs once");

    mock.respond("/global", 200, "{}");
    core.fetch(FetchRequest::json("https://api.test/global"))
        .await
        .unwrap();
    let feed = news.feed(Language::En).await;
    assert!(feed.placeholder);

    let text = metrics.handle.render();
    assert!(text.contains("# HELP fetch_upstream_calls_total"), "{text}");
    assert!(text.contains("# HELP news_placeholder_total"), "{text}");
}
