// src/providers/sentiment.rs
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::fetch::{FetchCore, FetchError, FetchRequest};
use crate::providers::parse_timestamp_ms;
use crate::types::FearGreed;

#[derive(Debug, Deserialize)]
struct FngResponse {
    #[serde(default)]
    data: Vec<FngEntry>,
}

#[derive(Debug, Deserialize)]
struct FngEntry {
    value: String,
    value_classification: String,
    timestamp: String,
    time_until_update: Option<String>,
}

/// The index is published once a day.
pub const SENTIMENT_TTL: Duration = Duration::from_secs(600);

/// Fear & greed index.
#[derive(Clone)]
pub struct SentimentClient {
    core: FetchCore,
    url: String,
}

impl SentimentClient {
    pub fn new(core: FetchCore, url: impl Into<String>) -> Self {
        Self {
            core,
            url: url.into(),
        }
    }

    pub async fn fear_greed(&self) -> Option<FearGreed> {
        let req = FetchRequest::json(self.url.clone())
            .retries(2, 1000)
            .ttl(SENTIMENT_TTL);
        let resp = self.core.fetch_json(req).await.and_then(|v| {
            serde_json::from_value::<FngResponse>(v).map_err(|e| FetchError::Decode(e.to_string()))
        });
        let entry = match resp {
            Ok(r) => r.data.into_iter().next()?,
            Err(e) => {
                warn!(target: "sentiment", error = %e, "fear/greed unavailable");
                return None;
            }
        };
        Some(FearGreed {
            value: entry.value.trim().parse().ok()?,
            classification: entry.value_classification,
            timestamp: parse_timestamp_ms(&entry.timestamp).unwrap_or(0),
            time_until_update_secs: entry
                .time_until_update
                .and_then(|s| s.trim().parse().ok()),
        })
    }
}
