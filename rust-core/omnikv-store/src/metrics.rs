// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Metrics-collecting wrapper for omnikv stores.
//
// Wraps any `Store` and transparently collects operation counts, hit/miss
// counts, error counts and latency sums. The wrapper is itself a `Store`, so
// it drops into any call site (and the conformance harness) unchanged.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::StoreResult;
use crate::store::Store;

/// Accumulated statistics for a store.
///
/// All counters are monotonically increasing until
/// [`MetricsStore::reset_stats`] is called.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreStats {
    /// Number of `get` calls.
    pub get_count: u64,
    /// `get` calls that found a value.
    pub hit_count: u64,
    /// `get` calls that found nothing.
    pub miss_count: u64,
    /// Number of `set` calls.
    pub set_count: u64,
    /// Number of `delete` calls.
    pub delete_count: u64,
    /// Calls of any kind that returned an error.
    pub error_count: u64,
    /// Cumulative wall-clock latency of all `get` calls, in milliseconds.
    pub get_latency_sum_ms: f64,
    /// Cumulative wall-clock latency of all `set` calls, in milliseconds.
    pub set_latency_sum_ms: f64,
}

/// A store wrapper that collects operation metrics.
///
/// # Example
///
/// ```rust
/// use omnikv_store::memory::{self, MemoryOptions};
/// use omnikv_store::metrics::MetricsStore;
/// use omnikv_store::Store;
///
/// # tokio_test::block_on(async {
/// let metered = MetricsStore::new(memory::open_store(MemoryOptions::default()).unwrap());
///
/// metered.set("key", "value").await.unwrap();
/// metered.get("key", &mut String::new()).await.unwrap();
///
/// let stats = metered.stats().await;
/// assert_eq!(stats.set_count, 1);
/// assert_eq!(stats.hit_count, 1);
/// # });
/// ```
pub struct MetricsStore<S: Store> {
    inner: S,
    stats: Arc<RwLock<StoreStats>>,
}

impl<S: Store> MetricsStore<S> {
    /// Wrap `inner` with metrics collection.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            stats: Arc::new(RwLock::new(StoreStats::default())),
        }
    }

    /// Snapshot of the current statistics.
    pub async fn stats(&self) -> StoreStats {
        self.stats.read().await.clone()
    }

    /// Reset all statistics to zero.
    pub async fn reset_stats(&self) {
        *self.stats.write().await = StoreStats::default();
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: Store> Store for MetricsStore<S> {
    async fn set<T>(&self, key: &str, value: &T) -> StoreResult<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        let start = Instant::now();
        let result = self.inner.set(key, value).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let mut s = self.stats.write().await;
        s.set_count += 1;
        s.set_latency_sum_ms += elapsed_ms;
        if result.is_err() {
            s.error_count += 1;
        }

        result
    }

    async fn get<T>(&self, key: &str, out: &mut T) -> StoreResult<bool>
    where
        T: DeserializeOwned + Send,
    {
        let start = Instant::now();
        let result = self.inner.get(key, out).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let mut s = self.stats.write().await;
        s.get_count += 1;
        s.get_latency_sum_ms += elapsed_ms;
        match result {
            Ok(true) => s.hit_count += 1,
            Ok(false) => s.miss_count += 1,
            Err(_) => s.error_count += 1,
        }

        result
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let result = self.inner.delete(key).await;

        let mut s = self.stats.write().await;
        s.delete_count += 1;
        if result.is_err() {
            s.error_count += 1;
        }

        result
    }

    async fn close(&self) -> StoreResult<()> {
        self.inner.close().await
    }
}
