// src/services.rs
//! Wires one fetch core into every adapter and consumer.

use std::sync::Arc;

use tracing::info;

use crate::config::FeedConfig;
use crate::fetch::{FetchCore, ResourceCache, Transport};
use crate::news::NewsAggregator;
use crate::onchain::{RandomMetrics, SimulatedMetrics};
use crate::prefs::PrefsStore;
use crate::providers::{CoinNewsClient, GlobalStatsClient, MarketDataClient, SentimentClient, WalletClient};
use crate::resolver::SymbolResolver;

/// Everything the HTTP surface needs. Cheap to clone.
#[derive(Clone)]
pub struct Services {
    pub core: FetchCore,
    pub market: MarketDataClient,
    pub global: GlobalStatsClient,
    pub sentiment: SentimentClient,
    pub coin_news: CoinNewsClient,
    pub wallet: WalletClient,
    pub resolver: SymbolResolver,
    pub news: NewsAggregator,
    pub simulated: Arc<dyn SimulatedMetrics>,
    pub prefs: Arc<PrefsStore>,
}

impl Services {
    pub async fn from_config(cfg: &FeedConfig, transport: Arc<dyn Transport>) -> Self {
        let core = FetchCore::new(
            transport,
            ResourceCache::with_ttl(cfg.cache.ttl()),
            cfg.backoff,
        );
        if cfg.api_key.is_some() {
            core.set_api_key(cfg.api_key.clone());
        }

        let ep = &cfg.endpoints;
        let market = MarketDataClient::new(core.clone(), ep.market_base.clone());
        let services = Self {
            global: GlobalStatsClient::new(core.clone(), &ep.market_base),
            sentiment: SentimentClient::new(core.clone(), ep.fear_greed_url.clone()),
            coin_news: CoinNewsClient::new(core.clone(), ep.news_api_base.clone()),
            wallet: WalletClient::new(core.clone(), ep.balance_base.clone(), ep.balance_api_key.clone()),
            resolver: SymbolResolver::new(market.clone()),
            news: NewsAggregator::from_config(&core, ep, &cfg.news),
            simulated: Arc::new(RandomMetrics),
            prefs: Arc::new(PrefsStore::open(cfg.prefs_path.clone()).await),
            market,
            core,
        };
        info!(
            key_present = services.core.has_api_key(),
            ttl_secs = cfg.cache.ttl_secs,
            "services ready"
        );
        services
    }

    /// Swap the simulated-metrics source (tests use fixed values).
    pub fn with_simulated(mut self, sim: Arc<dyn SimulatedMetrics>) -> Self {
        self.simulated = sim;
        self
    }
}
