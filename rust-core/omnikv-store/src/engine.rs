// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine capability trait.
//
// An engine is the raw byte-level primitive an adapter wraps: an embedded
// database, a cache, a map in memory. `KvStore` layers validation and a codec
// on top, so an engine never sees an empty key or a typed value. Engines must
// be safe to share across threads and tokio tasks; how they achieve that (a
// lock, a transaction, a concurrent map) is their own business.

use async_trait::async_trait;

use crate::error::StoreResult;

/// Byte-level key-value primitive wrapped by a [`KvStore`](crate::KvStore).
#[async_trait]
pub trait Engine: Send + Sync {
    /// Engine name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Look up the bytes stored under `key`.
    ///
    /// Returns `Ok(None)` when the key is absent; absence is never an error.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Vec<u8>) -> StoreResult<()>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Release the engine handle.
    ///
    /// Consumes the engine, so no call can follow it.
    async fn close(self) -> StoreResult<()>
    where
        Self: Sized;
}
