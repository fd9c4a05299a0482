// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <j.d.a.jewell@open.ac.uk>
//
// redb-backed transactional engine for omnikv.
//
// Uses redb (pure Rust, B-tree, ACID, single-file database) to provide
// durable key-value storage. No C/C++ dependencies.
//
// # Design
//
// - One redb `Database` file; the configured bucket is a redb table, so
//   several buckets can share a file.
// - The bucket table is created when the engine opens, so readers never
//   race table creation.
// - Read transactions for `get` (concurrent, lock-free).
// - Write transactions for `set`/`delete` (serialised by redb internally).
// - Every call runs on tokio's blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, TableDefinition};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::codec::Encoding;
use crate::engine::Engine;
use crate::error::{ConfigError, StoreError, StoreResult};
use crate::store::KvStore;

const NAME: &str = "redb";

/// How long `close` waits for cancelled calls to release the database.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(30);
const CLOSE_POLL: Duration = Duration::from_millis(5);

/// A [`KvStore`] over a [`RedbEngine`].
pub type RedbStore = KvStore<RedbEngine, Encoding>;

fn bucket_table(name: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(name)
}

/// A persistent engine powered by redb.
///
/// Thread-safe: `Database` is `Send + Sync` and handles internal locking.
///
/// # Example
///
/// ```rust,no_run
/// use omnikv_store::redb_backend::{self, RedbOptions};
/// use omnikv_store::Store;
///
/// # tokio_test::block_on(async {
/// let store = redb_backend::open_store(RedbOptions {
///     path: Some("/tmp/omnikv-test.redb".into()),
///     bucket: Some("users".into()),
///     ..Default::default()
/// })
/// .unwrap();
/// store.set("hello", "world").await.unwrap();
/// store.close().await.unwrap();
/// # });
/// ```
pub struct RedbEngine {
    db: Arc<Database>,
    path: PathBuf,
    bucket: Arc<str>,
}

impl RedbEngine {
    /// Open or create the database file and its bucket table.
    pub fn open(config: &RedbConfig) -> StoreResult<Self> {
        let path = config.path.clone();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::engine(NAME, e))?;
        }

        let db = Database::create(&path).map_err(|e| StoreError::engine(NAME, e))?;

        let txn = db.begin_write().map_err(|e| StoreError::engine(NAME, e))?;
        txn.open_table(bucket_table(&config.bucket))
            .map_err(|e| StoreError::engine(NAME, e))?;
        txn.commit().map_err(|e| StoreError::engine(NAME, e))?;

        debug!(path = %path.display(), bucket = %config.bucket, "opened redb engine");

        Ok(Self {
            db: Arc::new(db),
            path,
            bucket: Arc::from(config.bucket.as_str()),
        })
    }

    /// Filesystem path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the bucket table this engine reads and writes.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn blocking<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database, &str) -> StoreResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let bucket = Arc::clone(&self.bucket);
        tokio::task::spawn_blocking(move || op(&*db, &*bucket))
            .await
            .map_err(|e| StoreError::engine(NAME, e))?
    }
}

impl std::fmt::Debug for RedbEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbEngine")
            .field("path", &self.path)
            .field("bucket", &self.bucket)
            .finish()
    }
}

#[async_trait]
impl Engine for RedbEngine {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let key = key.to_string();
        self.blocking(move |db, bucket| {
            let txn = db.begin_read().map_err(|e| StoreError::engine(NAME, e))?;
            let table = txn
                .open_table(bucket_table(bucket))
                .map_err(|e| StoreError::engine(NAME, e))?;
            let value = table
                .get(key.as_str())
                .map_err(|e| StoreError::engine(NAME, e))?;
            Ok(value.map(|v| v.value().to_vec()))
        })
        .await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let key = key.to_string();
        self.blocking(move |db, bucket| {
            let txn = db.begin_write().map_err(|e| StoreError::engine(NAME, e))?;
            {
                let mut table = txn
                    .open_table(bucket_table(bucket))
                    .map_err(|e| StoreError::engine(NAME, e))?;
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(|e| StoreError::engine(NAME, e))?;
            }
            txn.commit().map_err(|e| StoreError::engine(NAME, e))
        })
        .await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let key = key.to_string();
        self.blocking(move |db, bucket| {
            let txn = db.begin_write().map_err(|e| StoreError::engine(NAME, e))?;
            {
                let mut table = txn
                    .open_table(bucket_table(bucket))
                    .map_err(|e| StoreError::engine(NAME, e))?;
                table
                    .remove(key.as_str())
                    .map_err(|e| StoreError::engine(NAME, e))?;
            }
            txn.commit().map_err(|e| StoreError::engine(NAME, e))
        })
        .await
    }

    async fn close(self) -> StoreResult<()> {
        // redb commits are durable on return; closing only drops the handle,
        // which releases the file lock. A blocking call whose caller was
        // cancelled still holds a clone until it finishes, so wait for it.
        let deadline = Instant::now() + CLOSE_TIMEOUT;
        let mut db = self.db;
        loop {
            match Arc::try_unwrap(db) {
                Ok(db) => {
                    tokio::task::spawn_blocking(move || drop(db))
                        .await
                        .map_err(|e| StoreError::engine(NAME, e))?;
                    break;
                }
                Err(shared) if Instant::now() < deadline => {
                    debug!(path = %self.path.display(), "waiting for in-flight redb calls");
                    db = shared;
                    tokio::time::sleep(CLOSE_POLL).await;
                }
                Err(_) => {
                    warn!(path = %self.path.display(), "redb handle still in use at close");
                    return Err(StoreError::engine(
                        NAME,
                        "database handle still held by an unfinished operation",
                    ));
                }
            }
        }
        debug!(path = %self.path.display(), "closed redb engine");
        Ok(())
    }
}

/// Options for [`open_store`]. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RedbOptions {
    /// Database file. Defaults to `omnikv.redb`.
    pub path: Option<PathBuf>,
    /// Bucket (redb table) holding the key-value pairs. Defaults to `default`.
    pub bucket: Option<String>,
    /// Value encoding. Defaults to [`Encoding::Json`].
    pub codec: Option<Encoding>,
}

/// Fully resolved redb configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedbConfig {
    /// Database file.
    pub path: PathBuf,
    /// Bucket table name.
    pub bucket: String,
    /// Value encoding.
    pub codec: Encoding,
}

/// Default database file.
pub const DEFAULT_PATH: &str = "omnikv.redb";
/// Default bucket.
pub const DEFAULT_BUCKET: &str = "default";

impl Default for RedbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_PATH),
            bucket: DEFAULT_BUCKET.to_string(),
            codec: Encoding::Json,
        }
    }
}

impl RedbOptions {
    /// Fill unset fields from [`RedbConfig::default`].
    ///
    /// Explicitly empty paths and bucket names are rejected rather than
    /// replaced with defaults.
    pub fn resolve(&self) -> Result<RedbConfig, ConfigError> {
        let defaults = RedbConfig::default();

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

        let bucket = match &self.bucket {
            Some(bucket) if bucket.is_empty() => {
                return Err(ConfigError::InvalidOption {
                    option: "bucket",
                    reason: "must not be empty".to_string(),
                })
            }
            Some(bucket) => bucket.clone(),
            None => defaults.bucket,
        };

        Ok(RedbConfig {
            path,
            bucket,
            codec: self.codec.unwrap_or(defaults.codec),
        })
    }
}

/// Open a redb store.
///
/// Call [`Store::close`](crate::Store::close) when done to release the file.
pub fn open_store(options: RedbOptions) -> StoreResult<RedbStore> {
    let config = options.resolve()?;
    let engine = RedbEngine::open(&config)?;
    Ok(KvStore::new(engine, config.codec))
}
