// src/providers/global.rs
use serde::Deserialize;
use tracing::warn;

use crate::fetch::{FetchCore, FetchError, FetchRequest};
use crate::types::GlobalStats;

/// Global market aggregates (total cap, volume, dominance).
#[derive(Clone)]
pub struct GlobalStatsClient {
    core: FetchCore,
    url: String,
}

impl GlobalStatsClient {
    pub fn new(core: FetchCore, market_base: &str) -> Self {
        Self {
            core,
            url: format!("{}/global", market_base.trim_end_matches('/')),
        }
    }

    /// Current aggregates, or zeroed aggregates when the upstream is down.
    pub async fn fetch(&self) -> GlobalStats {
        #[derive(Deserialize)]
        struct Envelope {
            data: GlobalStats,
        }

        let req = FetchRequest::json(self.url.clone())
            .retries(3, 2000)
            .authenticated();
        let res = self.core.fetch_json(req).await.and_then(|v| {
            serde_json::from_value::<Envelope>(v).map_err(|e| FetchError::Decode(e.to_string()))
        });
        match res {
            Ok(env) => env.data,
            Err(e) => {
                warn!(target: "market", error = %e, "global stats unavailable");
                GlobalStats::zeroed()
            }
        }
    }
}
