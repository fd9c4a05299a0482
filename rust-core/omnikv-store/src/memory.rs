// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory engine for omnikv.
//
// Uses a `HashMap` wrapped in a tokio `RwLock` for thread-safe key-value
// storage. Intended for testing, development, and small ephemeral datasets,
// and as the reference engine the conformance harness certifies first.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::codec::Encoding;
use crate::engine::Engine;
use crate::error::StoreResult;
use crate::store::KvStore;

/// A [`KvStore`] over a [`MemoryEngine`].
pub type MemoryStore = KvStore<MemoryEngine, Encoding>;

/// An in-memory engine backed by a `HashMap`.
///
/// All data lives in process memory and is lost on close. Clones share the
/// same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    data: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryEngine {
    /// Create a new, empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// True if no keys are stored.
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait]
impl Engine for MemoryEngine {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let map = self.data.read().await;
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let mut map = self.data.write().await;
        map.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut map = self.data.write().await;
        map.remove(key);
        Ok(())
    }

    async fn close(self) -> StoreResult<()> {
        let mut map = self.data.write().await;
        debug!(keys = map.len(), "closing memory engine");
        map.clear();
        Ok(())
    }
}

/// Options for [`open_store`]. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MemoryOptions {
    /// Value encoding. Defaults to [`Encoding::Json`].
    pub codec: Option<Encoding>,
}

/// Fully resolved memory store configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Value encoding.
    pub codec: Encoding,
}

/// Defaults applied by [`MemoryOptions::resolve`].
pub const DEFAULT_MEMORY_CONFIG: MemoryConfig = MemoryConfig {
    codec: Encoding::Json,
};

impl MemoryOptions {
    /// Fill unset fields from [`DEFAULT_MEMORY_CONFIG`].
    pub fn resolve(&self) -> MemoryConfig {
        MemoryConfig {
            codec: self.codec.unwrap_or(DEFAULT_MEMORY_CONFIG.codec),
        }
    }
}

/// Open an empty in-memory store.
pub fn open_store(options: MemoryOptions) -> StoreResult<MemoryStore> {
    let config = options.resolve();
    Ok(KvStore::new(MemoryEngine::new(), config.codec))
}
