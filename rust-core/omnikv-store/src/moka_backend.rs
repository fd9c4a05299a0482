// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <j.d.a.jewell@open.ac.uk>
//
// Cost-aware cache engine for omnikv, built on moka.
//
// Every entry costs its key length plus its encoded value length, and the
// cache keeps the total cost under `max_cost` using moka's TinyLFU policy.
// Entries may be evicted at any time; that is the nature of a cache and not
// an error. An entry that could never fit (its own cost exceeds `max_cost`)
// is refused with `StoreError::Admission` instead of being silently dropped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::codec::Encoding;
use crate::engine::Engine;
use crate::error::{ConfigError, StoreError, StoreResult};
use crate::store::KvStore;

const NAME: &str = "moka";

/// A [`KvStore`] over a [`MokaEngine`].
pub type MokaStore = KvStore<MokaEngine, Encoding>;

/// Cost of one entry: key bytes plus value bytes.
fn entry_cost(key: &str, value: &[u8]) -> u64 {
    (key.len() + value.len()) as u64
}

/// An in-memory cache engine with cost-based eviction.
#[derive(Clone)]
pub struct MokaEngine {
    cache: Cache<String, Arc<[u8]>>,
    max_cost: u64,
}

impl MokaEngine {
    /// Build a cache from a resolved configuration.
    pub fn new(config: &MokaConfig) -> Self {
        let mut builder = Cache::builder()
            .max_capacity(config.max_cost)
            .initial_capacity(config.initial_capacity)
            .weigher(|key: &String, value: &Arc<[u8]>| -> u32 {
                u32::try_from(entry_cost(key, value)).unwrap_or(u32::MAX)
            });
        if let Some(ttl) = config.time_to_live {
            builder = builder.time_to_live(ttl);
        }

        debug!(
            max_cost = config.max_cost,
            initial_capacity = config.initial_capacity,
            time_to_live = ?config.time_to_live,
            "opened moka engine"
        );

        Self {
            cache: builder.build(),
            max_cost: config.max_cost,
        }
    }

    /// Total cost the cache may hold.
    pub fn max_cost(&self) -> u64 {
        self.max_cost
    }
}

impl std::fmt::Debug for MokaEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaEngine")
            .field("max_cost", &self.max_cost)
            .finish()
    }
}

#[async_trait]
impl Engine for MokaEngine {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.cache.get(key).await.map(|value| value.to_vec()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let cost = entry_cost(key, &value);
        if cost > self.max_cost {
            warn!(key, cost, max_cost = self.max_cost, "entry refused by cache");
            return Err(StoreError::Admission {
                backend: NAME,
                key: key.to_string(),
                reason: format!("cost {cost} exceeds max cost {}", self.max_cost),
            });
        }
        self.cache.insert(key.to_string(), Arc::from(value)).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn close(self) -> StoreResult<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        debug!("closed moka engine");
        Ok(())
    }
}

/// Options for [`open_store`]. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MokaOptions {
    /// Maximum total cost (bytes of keys plus values). Defaults to 64 MiB.
    pub max_cost: Option<u64>,
    /// Expected number of entries, used to size internal tables. Defaults
    /// to 1000.
    pub initial_capacity: Option<usize>,
    /// Expire entries this long after they are written. Defaults to never.
    pub time_to_live: Option<Duration>,
    /// Value encoding. Defaults to [`Encoding::Json`].
    pub codec: Option<Encoding>,
}

/// Fully resolved cache configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MokaConfig {
    /// Maximum total cost.
    pub max_cost: u64,
    /// Expected number of entries.
    pub initial_capacity: usize,
    /// Entry lifetime, if any.
    pub time_to_live: Option<Duration>,
    /// Value encoding.
    pub codec: Encoding,
}

/// Defaults applied by [`MokaOptions::resolve`].
pub const DEFAULT_MOKA_CONFIG: MokaConfig = MokaConfig {
    max_cost: 64 * 1024 * 1024,
    initial_capacity: 1000,
    time_to_live: None,
    codec: Encoding::Json,
};

impl MokaOptions {
    /// Fill unset fields from [`DEFAULT_MOKA_CONFIG`].
    ///
    /// `None` means "use the default". An explicit zero `max_cost` or zero
    /// `time_to_live` is rejected; an explicit zero `initial_capacity` is
    /// honoured.
    pub fn resolve(&self) -> Result<MokaConfig, ConfigError> {
        let max_cost = match self.max_cost {
            Some(0) => {
                return Err(ConfigError::InvalidOption {
                    option: "max_cost",
                    reason: "must be positive".to_string(),
                })
            }
            Some(cost) => cost,
            None => DEFAULT_MOKA_CONFIG.max_cost,
        };

        let time_to_live = match self.time_to_live {
            Some(ttl) if ttl.is_zero() => {
                return Err(ConfigError::InvalidOption {
                    option: "time_to_live",
                    reason: "must be positive".to_string(),
                })
            }
            Some(ttl) => Some(ttl),
            None => DEFAULT_MOKA_CONFIG.time_to_live,
        };

        Ok(MokaConfig {
            max_cost,
            initial_capacity: self
                .initial_capacity
                .unwrap_or(DEFAULT_MOKA_CONFIG.initial_capacity),
            time_to_live,
            codec: self.codec.unwrap_or(DEFAULT_MOKA_CONFIG.codec),
        })
    }
}

/// Open an empty cache store.
pub fn open_store(options: MokaOptions) -> StoreResult<MokaStore> {
    let config = options.resolve()?;
    Ok(KvStore::new(MokaEngine::new(&config), config.codec))
}
