// src/fetch/backoff.rs
//! Retry delay computation and the suspension primitive used by the retry loop.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff tuning, threaded into every fetch instead of branching on globals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Multiplier applied per attempt (`base * growth^attempt`).
    pub growth: f64,
    /// Upper bound (exclusive) of the uniform jitter added to each delay.
    pub jitter_ms: u64,
    /// Base delay used for every call when an API key is configured.
    pub keyed_base_ms: u64,
    /// Factor applied to the adapter's base delay when no key is configured.
    pub anonymous_multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            growth: 1.5,
            jitter_ms: 200,
            keyed_base_ms: 500,
            anonymous_multiplier: 2.0,
        }
    }
}

impl BackoffPolicy {
    /// Effective base delay for one request.
    pub fn base_ms(&self, adapter_base_ms: u64, keyed: bool) -> u64 {
        if keyed {
            self.keyed_base_ms
        } else {
            (adapter_base_ms as f64 * self.anonymous_multiplier).round() as u64
        }
    }

    /// Delay before retrying after the 0-based `attempt`, without jitter.
    pub fn nominal_delay(&self, base_ms: u64, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let ms = base_ms as f64 * self.growth.powi(exp);
        Duration::from_millis(ms.min(u64::MAX as f64) as u64)
    }

    /// Nominal delay plus uniform jitter in `[0, jitter_ms)`.
    pub fn delay(&self, base_ms: u64, attempt: u32) -> Duration {
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..self.jitter_ms)
        };
        self.nominal_delay(base_ms, attempt) + Duration::from_millis(jitter)
    }

    /// Replace nonsensical values with defaults.
    pub fn sanitized(mut self) -> Self {
        let d = Self::default();
        if !self.growth.is_finite() || self.growth < 1.0 {
            self.growth = d.growth;
        }
        if !self.anonymous_multiplier.is_finite() || self.anonymous_multiplier <= 0.0 {
            self.anonymous_multiplier = d.anonymous_multiplier;
        }
        self
    }
}

/// Suspend the current task for `d`.
pub async fn delay(d: Duration) {
    tokio::time::sleep(d).await;
}
