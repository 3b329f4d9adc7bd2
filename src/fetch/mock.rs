// src/fetch/mock.rs
//! Scripted transport for tests; built with `cfg(test)` or the `test-util` feature.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::transport::{HttpResponse, Transport};
use super::FetchError;

/// Scripted in-memory transport.
///
/// Routes match when the requested URL contains the route pattern; the
/// longest matching pattern wins. Each route replays its queued outcomes in
/// order and keeps repeating the last one. Unrouted URLs fail as transient.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, VecDeque<Result<HttpResponse, FetchError>>>>,
    calls: Mutex<Vec<String>>,
    latency: Mutex<Option<Duration>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with `status` and `body` for URLs containing `pattern`.
    pub fn respond(&self, pattern: &str, status: u16, body: impl Into<String>) -> &Self {
        self.push(pattern, Ok(HttpResponse::new(status, body)))
    }

    /// Queue a network-level failure for URLs containing `pattern`.
    pub fn fail(&self, pattern: &str, err: FetchError) -> &Self {
        self.push(pattern, Err(err))
    }

    /// Every call sleeps this long before answering.
    pub fn set_latency(&self, d: Duration) {
        *self.latency.lock().expect("mock mutex poisoned") = Some(d);
    }

    fn push(&self, pattern: &str, outcome: Result<HttpResponse, FetchError>) -> &Self {
        self.routes
            .lock()
            .expect("mock mutex poisoned")
            .entry(pattern.to_string())
            .or_default()
            .push_back(outcome);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("mock mutex poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("mock mutex poisoned").len()
    }

    pub fn calls_matching(&self, pattern: &str) -> usize {
        self.calls
            .lock()
            .expect("mock mutex poisoned")
            .iter()
            .filter(|u| u.contains(pattern))
            .count()
    }

    fn next_outcome(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let mut routes = self.routes.lock().expect("mock mutex poisoned");
        let pattern = routes
            .keys()
            .filter(|p| url.contains(p.as_str()))
            .max_by_key(|p| p.len())
            .cloned();
        let Some(pattern) = pattern else {
            return Err(FetchError::Transient(format!("no mock route for {url}")));
        };
        let queue = routes.entry(pattern).or_default();
        if queue.len() > 1 {
            queue
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Transient("empty mock route".into())))
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(FetchError::Transient("empty mock route".into())))
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        self.calls
            .lock()
            .expect("mock mutex poisoned")
            .push(url.to_string());
        let latency = *self.latency.lock().expect("mock mutex poisoned");
        if let Some(d) = latency {
            tokio::time::sleep(d).await;
        }
        self.next_outcome(url)
    }
}
