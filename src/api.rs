// src/api.rs
//! JSON HTTP surface for the browser client.

use serde::{Deserialize, Serialize};
use serde_json::json;
use shuttle_axum::axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::fetch::FetchError;
use crate::news::NewsFeed;
use crate::onchain::{self, OnChainSnapshot};
use crate::portfolio::{self, PortfolioItem, PortfolioSummary};
use crate::prefs::{Preferences, Theme};
use crate::services::Services;
use crate::types::{ChartPoint, CoinRecord, FearGreed, GlobalStats, Language, NewsItem, WalletBalance};

pub type AppState = Services;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/global", get(global))
        .route("/fear-greed", get(fear_greed))
        .route("/coins/trending", get(trending))
        .route("/coins/markets", get(markets))
        .route("/coins/{query}", get(coin_detail))
        .route("/coins/{id}/history", get(history))
        .route("/coins/{id}/onchain", get(onchain_snapshot))
        .route("/news", get(news))
        .route("/news/coin/{symbol}", get(coin_news))
        .route("/wallet/{address}", get(wallet))
        .route("/portfolio/value", get(portfolio_stored).post(portfolio_posted))
        .route("/prefs", get(prefs))
        .route("/prefs/favorites/{id}", post(toggle_favorite))
        .route("/prefs/theme", put(set_theme))
        .route("/prefs/holdings", put(set_holdings))
        .route("/admin/api-key", post(set_api_key))
        .route("/debug/cache", get(debug_cache))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Error body: `{"error": "<kind>", "message": "..."}`.
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        let status = if e.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        Self {
            status,
            kind: if e.is_not_found() { "not_found" } else { "unavailable" },
            message: e.user_message().to_string(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        warn!(target: "api", error = %format!("{e:#}"), "internal error");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: "internal",
            message: "Request could not be completed.".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.kind, "message": self.message }));
        (self.status, body).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
struct LangQuery {
    #[serde(default)]
    lang: Option<String>,
}

impl LangQuery {
    fn language(&self) -> Language {
        self.lang.as_deref().map(Language::parse).unwrap_or_default()
    }
}

async fn global(State(s): State<AppState>) -> Json<GlobalStats> {
    Json(s.global.fetch().await)
}

async fn fear_greed(State(s): State<AppState>) -> Json<Option<FearGreed>> {
    Json(s.sentiment.fear_greed().await)
}

#[derive(Debug, Deserialize)]
struct TrendingQuery {
    #[serde(default = "default_category")]
    category: String,
}

fn default_category() -> String {
    "all".to_string()
}

async fn trending(State(s): State<AppState>, Query(q): Query<TrendingQuery>) -> Json<Vec<CoinRecord>> {
    Json(s.market.trending(&q.category).await)
}

#[derive(Debug, Deserialize)]
struct MarketsQuery {
    #[serde(default)]
    ids: String,
}

async fn markets(State(s): State<AppState>, Query(q): Query<MarketsQuery>) -> Json<Vec<CoinRecord>> {
    let ids: Vec<String> = q.ids.split(',').map(str::to_string).collect();
    Json(s.market.coins_market_data(&ids).await)
}

/// Resolve free text, then load the record. Unknown coins are 404.
async fn resolve_and_load(s: &AppState, query: &str) -> Result<CoinRecord, ApiError> {
    let id = s.resolver.resolve(query).await;
    let record = s.market.coin_detail(&id).await?;
    info!(target: "api", query, %id, "coin detail");
    Ok(record)
}

async fn coin_detail(
    State(s): State<AppState>,
    Path(query): Path<String>,
) -> Result<Json<CoinRecord>, ApiError> {
    resolve_and_load(&s, &query).await.map(Json)
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    #[serde(default = "default_days")]
    days: u32,
}

fn default_days() -> u32 {
    7
}

async fn history(
    State(s): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> Json<Vec<ChartPoint>> {
    Json(s.market.history(&id, q.days).await)
}

#[derive(Debug, Serialize)]
struct OnChainOut {
    id: String,
    #[serde(flatten)]
    snapshot: OnChainSnapshot,
}

async fn onchain_snapshot(
    State(s): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OnChainOut>, ApiError> {
    let record = resolve_and_load(&s, &id).await?;
    let snapshot = onchain::snapshot(&record, s.simulated.as_ref());
    Ok(Json(OnChainOut {
        id: record.id,
        snapshot,
    }))
}

async fn news(State(s): State<AppState>, Query(q): Query<LangQuery>) -> Json<NewsFeed> {
    Json(s.news.feed(q.language()).await)
}

async fn coin_news(
    State(s): State<AppState>,
    Path(symbol): Path<String>,
    Query(q): Query<LangQuery>,
) -> Json<Vec<NewsItem>> {
    Json(s.coin_news.coin_news(&symbol, q.language()).await)
}

async fn wallet(State(s): State<AppState>, Path(address): Path<String>) -> Json<Vec<WalletBalance>> {
    let balances = s.wallet.balances(&address).await;
    let addr = address.trim().to_string();
    if !addr.is_empty() {
        if let Err(e) = s.prefs.update(|p| p.last_wallet = Some(addr)).await {
            warn!(target: "api", error = %format!("{e:#}"), "could not remember wallet");
        }
    }
    Json(balances)
}

async fn portfolio_stored(State(s): State<AppState>) -> Json<PortfolioSummary> {
    let holdings = s.prefs.snapshot().await.holdings;
    Json(portfolio::value_portfolio(&s.market, &holdings).await)
}

async fn portfolio_posted(
    State(s): State<AppState>,
    Json(items): Json<Vec<PortfolioItem>>,
) -> Json<PortfolioSummary> {
    Json(portfolio::value_portfolio(&s.market, &items).await)
}

async fn prefs(State(s): State<AppState>) -> Json<Preferences> {
    Json(s.prefs.snapshot().await)
}

#[derive(Debug, Serialize)]
struct FavoriteOut {
    id: String,
    favorite: bool,
}

async fn toggle_favorite(
    State(s): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FavoriteOut>, ApiError> {
    let favorite = s.prefs.update(|p| p.toggle_favorite(&id)).await?;
    Ok(Json(FavoriteOut {
        id: id.trim().to_lowercase(),
        favorite,
    }))
}

#[derive(Debug, Deserialize)]
struct ThemeIn {
    theme: Theme,
}

async fn set_theme(
    State(s): State<AppState>,
    Json(body): Json<ThemeIn>,
) -> Result<Json<Preferences>, ApiError> {
    let prefs = s
        .prefs
        .update(|p| {
            p.theme = body.theme;
            p.clone()
        })
        .await?;
    Ok(Json(prefs))
}

async fn set_holdings(
    State(s): State<AppState>,
    Json(items): Json<Vec<PortfolioItem>>,
) -> Result<Json<Preferences>, ApiError> {
    let prefs = s
        .prefs
        .update(|p| {
            p.holdings = items;
            p.clone()
        })
        .await?;
    Ok(Json(prefs))
}

#[derive(Debug, Deserialize)]
struct ApiKeyIn {
    #[serde(default)]
    api_key: Option<String>,
}

async fn set_api_key(State(s): State<AppState>, Json(body): Json<ApiKeyIn>) -> Json<serde_json::Value> {
    s.core.set_api_key(body.api_key);
    Json(json!({ "key_present": s.core.has_api_key() }))
}

#[derive(Debug, Serialize)]
struct CacheInfo {
    entries: usize,
    inflight: usize,
    ttl_secs: u64,
    key_present: bool,
}

async fn debug_cache(State(s): State<AppState>) -> Json<CacheInfo> {
    Json(CacheInfo {
        entries: s.core.cache().len(),
        inflight: s.core.inflight().len(),
        ttl_secs: s.core.cache().ttl().as_secs(),
        key_present: s.core.has_api_key(),
    })
}
