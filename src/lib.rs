// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod fetch;
pub mod metrics;
pub mod news;
pub mod onchain;
pub mod portfolio;
pub mod prefs;
pub mod providers;
pub mod resolver;
pub mod services;
pub mod types;

use std::sync::Arc;

use shuttle_axum::axum::Router;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::config::FeedConfig;
pub use crate::fetch::{FetchCore, FetchError, FetchRequest};
pub use crate::services::Services;

/// Full HTTP app over `transport`, without the metrics exporter (the binary
/// merges that in once per process).
pub async fn app(cfg: &FeedConfig, transport: Arc<dyn fetch::Transport>) -> Router {
    let services = Services::from_config(cfg, transport).await;
    api::router(services)
}
