// src/fetch/inflight.rs
//! Registry of pending upstream calls, one per request key.

use std::collections::HashMap;
use std::sync::Mutex;

use futures::future::{BoxFuture, FutureExt, Shared};

use super::{FetchError, Payload};

pub type FetchFuture = BoxFuture<'static, Result<Payload, FetchError>>;
pub type SharedFetch = Shared<FetchFuture>;

#[derive(Default)]
pub struct InflightRegistry {
    pending: Mutex<HashMap<String, SharedFetch>>,
}

impl InflightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to the pending call for `key`, or register the one built by
    /// `start`. Returns the shared handle and `true` when this caller started it.
    ///
    /// Lookup and insert happen under one lock, so two callers can never both
    /// start a call for the same key.
    pub fn join_or_start<F>(&self, key: &str, start: F) -> (SharedFetch, bool)
    where
        F: FnOnce() -> FetchFuture,
    {
        let mut map = self.pending.lock().expect("inflight mutex poisoned");
        if let Some(existing) = map.get(key) {
            return (existing.clone(), false);
        }
        let fut = start().shared();
        map.insert(key.to_string(), fut.clone());
        (fut, true)
    }

    pub fn remove(&self, key: &str) {
        self.pending
            .lock()
            .expect("inflight mutex poisoned")
            .remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pending
            .lock()
            .expect("inflight mutex poisoned")
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().expect("inflight mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
