// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <j.d.a.jewell@open.ac.uk>
//
// sled-backed log-structured engine for omnikv.
//
// sled buffers writes in memory and persists them through its own log and
// periodic flushes. With `write_sync` enabled every `set` and `delete` waits
// for a flush before returning, trading latency for never losing an
// acknowledged write on a crash.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::codec::Encoding;
use crate::engine::Engine;
use crate::error::{ConfigError, StoreError, StoreResult};
use crate::store::KvStore;

const NAME: &str = "sled";

/// A [`KvStore`] over a [`SledEngine`].
pub type SledStore = KvStore<SledEngine, Encoding>;

/// A persistent engine powered by sled.
///
/// `sled::Db` is internally synchronised and cheap to clone; each blocking
/// call gets its own handle clone.
pub struct SledEngine {
    db: sled::Db,
    path: PathBuf,
    write_sync: bool,
}

impl SledEngine {
    /// Open or create the sled database directory.
    pub fn open(config: &SledConfig) -> StoreResult<Self> {
        let db = sled::Config::new()
            .path(&config.path)
            .cache_capacity(config.cache_capacity)
            .open()
            .map_err(|e| StoreError::engine(NAME, e))?;

        debug!(
            path = %config.path.display(),
            write_sync = config.write_sync,
            cache_capacity = config.cache_capacity,
            "opened sled engine"
        );

        Ok(Self {
            db,
            path: config.path.clone(),
            write_sync: config.write_sync,
        })
    }

    /// Directory holding the sled files.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether writes flush before returning.
    pub fn write_sync(&self) -> bool {
        self.write_sync
    }

    async fn blocking<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&sled::Db) -> sled::Result<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(|e| StoreError::engine(NAME, e))?
            .map_err(|e| StoreError::engine(NAME, e))
    }
}

impl std::fmt::Debug for SledEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledEngine")
            .field("path", &self.path)
            .field("write_sync", &self.write_sync)
            .finish()
    }
}

#[async_trait]
impl Engine for SledEngine {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let key = key.to_string();
        self.blocking(move |db| Ok(db.get(key.as_bytes())?.map(|v| v.to_vec())))
            .await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let key = key.to_string();
        let sync = self.write_sync;
        self.blocking(move |db| {
            db.insert(key.as_bytes(), value)?;
            if sync {
                db.flush()?;
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let key = key.to_string();
        let sync = self.write_sync;
        self.blocking(move |db| {
            db.remove(key.as_bytes())?;
            if sync {
                db.flush()?;
            }
            Ok(())
        })
        .await
    }

    async fn close(self) -> StoreResult<()> {
        // Flush whatever is still buffered; dropping the handle does not
        // report flush failures.
        let flushed = self.blocking(|db| db.flush()).await?;
        debug!(path = %self.path.display(), flushed, "closed sled engine");
        Ok(())
    }
}

/// Options for [`open_store`]. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SledOptions {
    /// Database directory. Defaults to `omnikv-sled`.
    pub path: Option<PathBuf>,
    /// Flush after every write. Defaults to `false`.
    pub write_sync: Option<bool>,
    /// Page cache size in bytes. Defaults to 64 MiB.
    pub cache_capacity: Option<u64>,
    /// Value encoding. Defaults to [`Encoding::Json`].
    pub codec: Option<Encoding>,
}

/// Fully resolved sled configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SledConfig {
    /// Database directory.
    pub path: PathBuf,
    /// Flush after every write.
    pub write_sync: bool,
    /// Page cache size in bytes.
    pub cache_capacity: u64,
    /// Value encoding.
    pub codec: Encoding,
}

/// Default database directory.
pub const DEFAULT_PATH: &str = "omnikv-sled";
/// Default page cache size.
pub const DEFAULT_CACHE_CAPACITY: u64 = 64 * 1024 * 1024;

impl Default for SledConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_PATH),
            write_sync: false,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            codec: Encoding::Json,
        }
    }
}

impl SledOptions {
    /// Fill unset fields from [`SledConfig::default`].
    ///
    /// An explicit empty path or zero cache capacity is rejected rather than
    /// replaced with the default.
    pub fn resolve(&self) -> Result<SledConfig, ConfigError> {
        let defaults = SledConfig::default();

        let path = match &self.path {
            Some(path) if path.as_os_str().is_empty() => {
                return Err(ConfigError::InvalidOption {
                    option: "path",
                    reason: "must not be empty".to_string(),
                })
            }
            Some(path) => path.clone(),
            None => defaults.path,
        };

        let cache_capacity = match self.cache_capacity {
            Some(0) => {
                return Err(ConfigError::InvalidOption {
                    option: "cache_capacity",
                    reason: "must be positive".to_string(),
                })
            }
            Some(bytes) => bytes,
            None => defaults.cache_capacity,
        };

        Ok(SledConfig {
            path,
            write_sync: self.write_sync.unwrap_or(defaults.write_sync),
            cache_capacity,
            codec: self.codec.unwrap_or(defaults.codec),
        })
    }
}

/// Open a sled store.
///
/// Call [`Store::close`](crate::Store::close) when done so buffered writes
/// are flushed.
pub fn open_store(options: SledOptions) -> StoreResult<SledStore> {
    let config = options.resolve()?;
    let engine = SledEngine::open(&config)?;
    Ok(KvStore::new(engine, config.codec))
}
