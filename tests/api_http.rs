// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot, with every
// upstream served by the scripted transport.

use std::sync::Arc;

use serde_json::Value as Json;
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tempfile::TempDir;
use tower::ServiceExt as _; // for `oneshot`

use market_pulse::api;
use market_pulse::config::FeedConfig;
use market_pulse::fetch::MockTransport;
use market_pulse::onchain::FixedMetrics;
use market_pulse::services::Services;

const BODY_LIMIT: usize = 1024 * 1024;
const CG: &str = "https://cg.test/api/v3";

struct Harness {
    mock: Arc<MockTransport>,
    app: Router,
    _dir: TempDir,
}

async fn harness() -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut cfg = FeedConfig::default();
    cfg.endpoints.market_base = CG.into();
    cfg.prefs_path = dir.path().join("prefs.json");

    let mock = Arc::new(MockTransport::new());
    let services = Services::from_config(&cfg, mock.clone())
        .await
        .with_simulated(Arc::new(FixedMetrics { flow: -40, holders: 1234 }));
    Harness {
        mock,
        app: api::router(services),
        _dir: dir,
    }
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Json) {
    let mut req = Request::builder().method(method).uri(uri);
    if body.is_some() {
        req = req.header("content-type", "application/json");
    }
    let req = req
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .expect("build request");
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, json)
}

#[tokio::test(start_paused = true)]
async fn health_returns_ok() {
    let h = harness().await;
    let req = Request::get("/health").body(Body::empty()).unwrap();
    let resp = h.app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test(start_paused = true)]
async fn unknown_coin_is_404_with_not_found_body() {
    let h = harness().await;
    h.mock.respond("/search?query=ghostcoin", 200, r#"{"coins": []}"#);
    h.mock.respond("ids=ghostcoin", 200, "[]");

    let (status, body) = send(&h.app, "GET", "/coins/ghostcoin", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test(start_paused = true)]
async fn upstream_outage_on_detail_is_503() {
    let h = harness().await;
    h.mock.respond("ids=bitcoin", 503, "");

    let (status, body) = send(&h.app, "GET", "/coins/btc", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "unavailable");
    assert_eq!(h.mock.calls_matching("/search"), 0);
}

#[tokio::test(start_paused = true)]
async fn coin_detail_and_onchain_snapshot() {
    let h = harness().await;
    h.mock.respond(
        "ids=ethereum",
        200,
        r#"[{"id": "ethereum", "symbol": "eth", "name": "Ethereum", "current_price": 3000.0,
             "market_cap": 1000.0, "total_volume": 100.0, "circulating_supply": 120.0}]"#,
    );

    let (status, body) = send(&h.app, "GET", "/coins/ETH", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "ethereum");
    assert_eq!(body["current_price"], 3000.0);

    let (status, body) = send(&h.app, "GET", "/coins/ethereum/onchain", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "ethereum");
    assert_eq!(body["activity"], "medium");
    assert_eq!(body["unlock_progress"], 100.0);
    assert_eq!(body["simulated"]["net_flow_status"], "outflow");
    assert_eq!(body["simulated"]["holders"], 1234);
    // second lookup came from the cache
    assert_eq!(h.mock.calls_matching("ids=ethereum"), 1);
}

#[tokio::test(start_paused = true)]
async fn dashboard_refreshes_share_one_global_call() {
    let h = harness().await;
    h.mock.respond(
        "/global",
        200,
        r#"{"data": {"total_market_cap": {"usd": 1.0}, "total_volume": {"usd": 2.0},
            "market_cap_percentage": {"btc": 50.0}}}"#,
    );

    for _ in 0..2 {
        let (status, body) = send(&h.app, "GET", "/global", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["market_cap_percentage"]["btc"], 50.0);
    }
    assert_eq!(h.mock.calls_matching("/global"), 1);
}

#[tokio::test(start_paused = true)]
async fn news_outage_still_returns_content() {
    let h = harness().await;

    let (status, body) = send(&h.app, "GET", "/news?lang=en", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["placeholder"], true);
    assert!(!body["flash"].as_array().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn api_key_swap_clears_cache() {
    let h = harness().await;
    h.mock.respond("/global", 200, r#"{"data": {}}"#);
    send(&h.app, "GET", "/global", None).await;

    let (_, before) = send(&h.app, "GET", "/debug/cache", None).await;
    assert_eq!(before["entries"], 1);
    assert_eq!(before["key_present"], false);

    let (status, body) = send(&h.app, "POST", "/admin/api-key", Some(r#"{"api_key": "abc"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["key_present"], true);

    let (_, after) = send(&h.app, "GET", "/debug/cache", None).await;
    assert_eq!(after["entries"], 0);

    send(&h.app, "GET", "/global", None).await;
    assert!(h.mock.calls()[1].ends_with("/global?x_cg_demo_api_key=abc"));
}

#[tokio::test(start_paused = true)]
async fn favorites_toggle_and_persist() {
    let h = harness().await;

    let (_, body) = send(&h.app, "POST", "/prefs/favorites/Solana", None).await;
    assert_eq!(body["favorite"], true);
    let (_, prefs) = send(&h.app, "GET", "/prefs", None).await;
    assert_eq!(prefs["favorites"][0], "solana");

    let (_, body) = send(&h.app, "POST", "/prefs/favorites/solana", None).await;
    assert_eq!(body["favorite"], false);
}

#[tokio::test(start_paused = true)]
async fn portfolio_values_posted_holdings() {
    let h = harness().await;
    h.mock.respond(
        "/coins/markets",
        200,
        r#"[{"id": "bitcoin", "current_price": 100.0, "price_change_percentage_24h": 0.0}]"#,
    );

    let holdings = r#"[
        {"id": "1", "coin_id": "bitcoin", "amount": 2.0, "avg_buy_price": 50.0},
        {"id": "2", "coin_id": "unlisted", "amount": 1.0}
    ]"#;
    let (status, body) = send(&h.app, "POST", "/portfolio/value", Some(holdings)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_value"], 200.0);
    assert_eq!(body["total_pnl"], 100.0);
    assert_eq!(body["unpriced"][0], "unlisted");
}

#[tokio::test(start_paused = true)]
async fn wallet_lookup_remembers_address() {
    let h = harness().await;
    h.mock.respond(
        "/getAddressInfo/0xfeed",
        200,
        r#"{"ETH": {"rawBalance": "2000000000000000000"}, "tokens": []}"#,
    );

    let (status, body) = send(&h.app, "GET", "/wallet/0xfeed", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["symbol"], "ETH");
    assert_eq!(body[0]["balance"], 2.0);

    let (_, prefs) = send(&h.app, "GET", "/prefs", None).await;
    assert_eq!(prefs["last_wallet"], "0xfeed");
}

#[tokio::test(start_paused = true)]
async fn wallet_lookup_failure_is_a_single_attempt() {
    let h = harness().await;
    h.mock
        .respond("/getAddressInfo/0xbad", 503, "")
        .respond("/getAddressInfo/0xbad", 200, r#"{"ETH": {"rawBalance": "1"}, "tokens": []}"#);

    let (status, body) = send(&h.app, "GET", "/wallet/0xbad", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!([]));
    assert_eq!(h.mock.calls_matching("/getAddressInfo"), 1);
}

#[tokio::test(start_paused = true)]
async fn portfolio_matches_ids_regardless_of_case() {
    let h = harness().await;
    h.mock.respond(
        "/coins/markets",
        200,
        r#"[{"id": "bitcoin", "current_price": 100.0}]"#,
    );

    let holdings = r#"[{"id": "1", "coin_id": "Bitcoin", "amount": 1.5}]"#;
    let (status, body) = send(&h.app, "POST", "/portfolio/value", Some(holdings)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_value"], 150.0);
    assert_eq!(body["unpriced"], serde_json::json!([]));
    assert!(h.mock.calls()[0].contains("ids=bitcoin"));
}
