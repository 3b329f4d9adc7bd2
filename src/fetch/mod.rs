// src/fetch/mod.rs
//! Resilient fetch core: cache lookup, in-flight coalescing, retry with
//! backoff, cache population.
//!
//! The core owns its cache and in-flight registry. Adapters receive a cloned
//! `FetchCore` handle; clones share the same state.

pub mod backoff;
pub mod cache;
pub mod error;
pub mod inflight;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod transport;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::FutureExt;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

pub use backoff::BackoffPolicy;
pub use cache::ResourceCache;
pub use error::FetchError;
pub use inflight::InflightRegistry;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockTransport;
pub use transport::{HttpResponse, ReqwestTransport, Transport};

/// Query parameter carrying the market-data API key.
pub const API_KEY_PARAM: &str = "x_cg_demo_api_key";

/// Decoded upstream response.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(serde_json::Value),
    Text(String),
}

impl Payload {
    pub fn into_json(self) -> Result<serde_json::Value, FetchError> {
        match self {
            Payload::Json(v) => Ok(v),
            Payload::Text(_) => Err(FetchError::Decode("expected JSON payload".into())),
        }
    }

    pub fn into_text(self) -> Result<String, FetchError> {
        match self {
            Payload::Text(s) => Ok(s),
            Payload::Json(v) => Ok(v.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    Text,
}

/// One logical upstream request and its per-adapter policy.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Upstream URL; also the cache and in-flight key. Never contains credentials.
    pub url: String,
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub use_cache: bool,
    /// Cache lifetime for this response; `None` uses the cache default.
    pub ttl: Option<Duration>,
    /// Append the API key (when configured) before sending.
    pub authenticated: bool,
    pub format: ResponseFormat,
}

impl FetchRequest {
    pub fn json(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_retries: 3,
            backoff_ms: 1000,
            use_cache: true,
            ttl: None,
            authenticated: false,
            format: ResponseFormat::Json,
        }
    }

    pub fn text(url: impl Into<String>) -> Self {
        Self {
            format: ResponseFormat::Text,
            ..Self::json(url)
        }
    }

    pub fn retries(mut self, max_retries: u32, backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_ms = backoff_ms;
        self
    }

    pub fn cached(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn authenticated(mut self) -> Self {
        self.authenticated = true;
        self
    }
}

/// Register descriptions for the fetch series with the installed recorder.
pub fn describe_metrics() {
    describe_counter!("fetch_cache_hits_total", "Requests served from the cache.");
    describe_counter!(
        "fetch_inflight_joins_total",
        "Requests attached to an already pending upstream call."
    );
    describe_counter!("fetch_upstream_calls_total", "Upstream HTTP attempts.");
    describe_counter!("fetch_retries_total", "Attempts scheduled after a failure.");
    describe_counter!("fetch_failures_total", "Requests that settled with an error.");
    describe_counter!(
        "fetch_abandoned_total",
        "Upstream calls whose task ended without producing a result."
    );
    describe_gauge!("fetch_cache_ttl_ms", "Configured cache TTL in milliseconds.");
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(describe_metrics);
}

/// Removes the registry entry when the upstream task ends, however it ends.
struct SettleGuard {
    inner: Arc<CoreInner>,
    key: String,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        self.inner.inflight.remove(&self.key);
    }
}

struct CoreInner {
    transport: Arc<dyn Transport>,
    cache: ResourceCache,
    inflight: InflightRegistry,
    policy: BackoffPolicy,
    api_key: RwLock<Option<String>>,
}

#[derive(Clone)]
pub struct FetchCore {
    inner: Arc<CoreInner>,
}

impl FetchCore {
    pub fn new(transport: Arc<dyn Transport>, cache: ResourceCache, policy: BackoffPolicy) -> Self {
        ensure_metrics_described();
        gauge!("fetch_cache_ttl_ms").set(cache.ttl().as_millis() as f64);
        Self {
            inner: Arc::new(CoreInner {
                transport,
                cache,
                inflight: InflightRegistry::new(),
                policy: policy.sanitized(),
                api_key: RwLock::new(None),
            }),
        }
    }

    /// Core with default TTL and backoff; mostly for tests.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self::new(transport, ResourceCache::default(), BackoffPolicy::default())
    }

    /// Swap the credential and drop every cached response.
    ///
    /// The cache is cleared before this returns, so no later fetch can read a
    /// response obtained under the previous credential.
    pub fn set_api_key(&self, key: Option<String>) {
        let key = key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
        let present = key.is_some();
        {
            let mut guard = self.inner.api_key.write().expect("api key lock poisoned");
            *guard = key;
        }
        self.inner.cache.clear();
        info!(target: "fetch", key_present = present, "credential changed; cache cleared");
    }

    pub fn has_api_key(&self) -> bool {
        self.inner
            .api_key
            .read()
            .expect("api key lock poisoned")
            .is_some()
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.inner.cache
    }

    pub fn inflight(&self) -> &InflightRegistry {
        &self.inner.inflight
    }

    /// Cache → in-flight → network with retry.
    pub async fn fetch(&self, req: FetchRequest) -> Result<Payload, FetchError> {
        if req.use_cache {
            if let Some(hit) = self.inner.cache.get(&req.url) {
                counter!("fetch_cache_hits_total").increment(1);
                debug!(target: "fetch", key = %req.url, "cache hit");
                return Ok(hit);
            }
        }

        let inner = Arc::clone(&self.inner);
        let key = req.url.clone();
        let (pending, started) = self.inner.inflight.join_or_start(&key, move || {
            // The upstream call runs on its own task so that it settles, and
            // leaves the registry, even when every caller has gone away.
            let task = tokio::spawn(async move {
                let _settle = SettleGuard {
                    inner: Arc::clone(&inner),
                    key: req.url.clone(),
                };
                // Cache is populated before the guard drops, so there is no
                // window where neither the cache nor the registry has the key.
                run_attempts(&inner, &req).await
            });
            async move {
                match task.await {
                    Ok(out) => out,
                    Err(e) => {
                        counter!("fetch_abandoned_total").increment(1);
                        Err(FetchError::Transient(format!("fetch task ended: {e}")))
                    }
                }
            }
            .boxed()
        });
        if !started {
            counter!("fetch_inflight_joins_total").increment(1);
            debug!(target: "fetch", key = %key, "joined pending request");
        }
        pending.await
    }

    pub async fn fetch_json(&self, req: FetchRequest) -> Result<serde_json::Value, FetchError> {
        self.fetch(req).await?.into_json()
    }

    pub async fn fetch_text(&self, req: FetchRequest) -> Result<String, FetchError> {
        self.fetch(FetchRequest {
            format: ResponseFormat::Text,
            ..req
        })
        .await?
        .into_text()
    }
}

fn with_api_key(url: &str, key: &str) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}{API_KEY_PARAM}={}", urlencoding::encode(key))
}

fn classify(resp: HttpResponse, url: &str, format: ResponseFormat) -> Result<Payload, FetchError> {
    match resp.status {
        404 => return Err(FetchError::NotFound(url.to_string())),
        429 => return Err(FetchError::RateLimited),
        s if !resp.is_success() => return Err(FetchError::Upstream { status: s }),
        _ => {}
    }
    match format {
        ResponseFormat::Json => serde_json::from_str(&resp.body)
            .map(Payload::Json)
            .map_err(|e| FetchError::Decode(e.to_string())),
        ResponseFormat::Text => Ok(Payload::Text(resp.body)),
    }
}

async fn run_attempts(inner: &CoreInner, req: &FetchRequest) -> Result<Payload, FetchError> {
    let key = if req.authenticated {
        inner.api_key.read().expect("api key lock poisoned").clone()
    } else {
        None
    };
    let keyed = key.is_some();
    let target = match &key {
        Some(k) => with_api_key(&req.url, k),
        None => req.url.clone(),
    };
    let base_ms = inner.policy.base_ms(req.backoff_ms, keyed);
    let max = req.max_retries.max(1);

    let mut attempt: u32 = 0;
    loop {
        counter!("fetch_upstream_calls_total").increment(1);
        let outcome = match inner.transport.get(&target).await {
            Ok(resp) => classify(resp, &req.url, req.format),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(payload) => {
                if req.use_cache {
                    match req.ttl {
                        Some(ttl) => inner.cache.set_with_ttl(&req.url, payload.clone(), ttl),
                        None => inner.cache.set(&req.url, payload.clone()),
                    }
                }
                return Ok(payload);
            }
            Err(err) if err.is_not_found() => {
                counter!("fetch_failures_total", "kind" => "not_found").increment(1);
                debug!(target: "fetch", key = %req.url, "upstream reports not found");
                return Err(err);
            }
            Err(err) => {
                attempt += 1;
                if attempt >= max || !err.is_retryable() {
                    counter!("fetch_failures_total", "kind" => err.kind()).increment(1);
                    warn!(
                        target: "fetch",
                        key = %req.url,
                        attempts = attempt,
                        error = %err,
                        "request failed"
                    );
                    return Err(FetchError::RequestFailed {
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }
                let wait = inner.policy.delay(base_ms, attempt - 1);
                counter!("fetch_retries_total").increment(1);
                debug!(
                    target: "fetch",
                    key = %req.url,
                    attempt,
                    delay_ms = wait.as_millis() as u64,
                    error = %err,
                    "retrying"
                );
                backoff::delay(wait).await;
            }
        }
    }
}
