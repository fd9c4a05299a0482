// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The Store contract and its generic implementation.
//
// `Store` is what application code programs against. `KvStore` implements it
// for any `Engine` + `Codec` pair: validate first, then encode, then hand the
// bytes to the engine. Every adapter in this crate returns a `KvStore`, so
// the contract semantics live in exactly one place.

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::codec::Codec;
use crate::engine::Engine;
use crate::error::{StoreError, StoreResult};
use crate::validation::{check_key, check_key_and_value};

/// Uniform key-value contract shared by every backend.
///
/// Implementations must be safe to call from many tokio tasks at once. No
/// ordering is promised between concurrent writers to the same key, only
/// the absence of errors and corruption. `close` must not race other calls.
#[async_trait]
pub trait Store: Send + Sync {
    /// Encode `value` and store it under `key`, replacing any previous value.
    ///
    /// Fails with [`StoreError::EmptyKey`] or [`StoreError::NilValue`] before
    /// the engine is touched.
    async fn set<T>(&self, key: &str, value: &T) -> StoreResult<()>
    where
        T: Serialize + Sync + ?Sized;

    /// Decode the value stored under `key` into `out`.
    ///
    /// Returns `Ok(false)` and leaves `out` untouched when the key is absent.
    ///
    /// `out` must be a live `&mut T`; a null target does not compile:
    ///
    /// ```compile_fail
    /// use omnikv_store::memory::{self, MemoryOptions};
    /// use omnikv_store::Store;
    ///
    /// # tokio_test::block_on(async {
    /// let store = memory::open_store(MemoryOptions::default()).unwrap();
    /// store.get("k", std::ptr::null_mut::<String>()).await.unwrap();
    /// # });
    /// ```
    async fn get<T>(&self, key: &str, out: &mut T) -> StoreResult<bool>
    where
        T: DeserializeOwned + Send;

    /// Remove `key`. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Release the engine. Later calls fail with [`StoreError::Closed`].
    async fn close(&self) -> StoreResult<()>;
}

/// A [`Store`] built from an [`Engine`] and a [`Codec`].
///
/// # Example
///
/// ```rust
/// use omnikv_store::memory::MemoryEngine;
/// use omnikv_store::{Encoding, KvStore, Store};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
/// struct Foo { bar: String }
///
/// # tokio_test::block_on(async {
/// let store = KvStore::new(MemoryEngine::new(), Encoding::Json);
///
/// store.set("user1", &Foo { bar: "baz".into() }).await.unwrap();
///
/// let mut out = Foo::default();
/// assert!(store.get("user1", &mut out).await.unwrap());
/// assert_eq!(out.bar, "baz");
///
/// store.delete("user1").await.unwrap();
/// assert!(!store.get("user1", &mut Foo::default()).await.unwrap());
/// store.close().await.unwrap();
/// # });
/// ```
pub struct KvStore<E, C> {
    /// `None` once the store is closed.
    engine: RwLock<Option<E>>,
    codec: C,
    backend: &'static str,
}

impl<E: Engine, C: Codec> KvStore<E, C> {
    /// Wrap an open engine with a codec.
    pub fn new(engine: E, codec: C) -> Self {
        let backend = engine.name();
        debug!(backend, codec = codec.name(), "store opened");
        Self {
            engine: RwLock::new(Some(engine)),
            codec,
            backend,
        }
    }

    /// The codec used for every value.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Name of the wrapped engine.
    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// True once [`Store::close`] has run.
    pub async fn is_closed(&self) -> bool {
        self.engine.read().await.is_none()
    }

    /// Fetch and decode the value under `key`, returning it by value.
    ///
    /// Returns `Ok(None)` when the key is absent.
    pub async fn fetch<T>(&self, key: &str) -> StoreResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        check_key(key)?;
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn read_bytes(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let guard = self.engine.read().await;
        let engine = guard.as_ref().ok_or(StoreError::Closed)?;
        let bytes = engine.get(key).await?;
        trace!(backend = self.backend, key, found = bytes.is_some(), "get");
        Ok(bytes)
    }
}

#[async_trait]
impl<E: Engine, C: Codec> Store for KvStore<E, C> {
    async fn set<T>(&self, key: &str, value: &T) -> StoreResult<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        check_key_and_value(key, value)?;
        let guard = self.engine.read().await;
        let engine = guard.as_ref().ok_or(StoreError::Closed)?;
        let bytes = self.codec.marshal(value)?;
        trace!(backend = self.backend, key, len = bytes.len(), "set");
        engine.set(key, bytes).await
    }

    async fn get<T>(&self, key: &str, out: &mut T) -> StoreResult<bool>
    where
        T: DeserializeOwned + Send,
    {
        check_key(key)?;
        match self.read_bytes(key).await? {
            Some(bytes) => {
                self.codec.unmarshal(&bytes, out)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        check_key(key)?;
        let guard = self.engine.read().await;
        let engine = guard.as_ref().ok_or(StoreError::Closed)?;
        trace!(backend = self.backend, key, "delete");
        engine.delete(key).await
    }

    async fn close(&self) -> StoreResult<()> {
        // Taking the write side waits for in-flight calls to drain.
        let engine = self.engine.write().await.take();
        match engine {
            Some(engine) => {
                debug!(backend = self.backend, "closing store");
                engine.close().await
            }
            None => Ok(()),
        }
    }
}

impl<E, C: Codec> fmt::Debug for KvStore<E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvStore")
            .field("backend", &self.backend)
            .field("codec", &self.codec.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Encoding, JsonCodec};
    use crate::memory::MemoryEngine;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Foo {
        bar: String,
    }

    /// Counts every call that reaches the engine.
    #[derive(Default)]
    struct SpyEngine {
        inner: MemoryEngine,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Engine for SpyEngine {
        fn name(&self) -> &'static str {
            "spy"
        }

        async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.set(key, value).await
        }

        async fn delete(&self, key: &str) -> StoreResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.delete(key).await
        }

        async fn close(self) -> StoreResult<()> {
            self.inner.close().await
        }
    }

    #[tokio::test]
    async fn test_validation_never_reaches_engine() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = SpyEngine {
            inner: MemoryEngine::new(),
            calls: Arc::clone(&calls),
        };
        let store = KvStore::new(engine, JsonCodec);

        assert!(matches!(
            store.set("", &Foo::default()).await,
            Err(StoreError::EmptyKey)
        ));
        assert!(matches!(
            store.set("k", &None::<Foo>).await,
            Err(StoreError::NilValue)
        ));
        assert!(matches!(
            store.get("", &mut Foo::default()).await,
            Err(StoreError::EmptyKey)
        ));
        assert!(matches!(store.delete("").await, Err(StoreError::EmptyKey)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        store.set("k", &Foo::default()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_serialization_error_never_reaches_engine() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = SpyEngine {
            inner: MemoryEngine::new(),
            calls: Arc::clone(&calls),
        };
        let store = KvStore::new(engine, Encoding::Json);

        let mut map = std::collections::BTreeMap::new();
        map.insert((1, 1), 1);
        let err = store.set("k", &map).await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization { codec: "json", .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_key_leaves_target_untouched() {
        let store = KvStore::new(MemoryEngine::new(), Encoding::Cbor);
        let mut out = Foo {
            bar: "untouched".to_string(),
        };
        assert!(!store.get("absent", &mut out).await.unwrap());
        assert_eq!(out.bar, "untouched");
    }

    #[tokio::test]
    async fn test_fetch_by_value() {
        let store = KvStore::new(MemoryEngine::new(), Encoding::Postcard);
        store.set("n", &42u64).await.unwrap();
        assert_eq!(store.fetch::<u64>("n").await.unwrap(), Some(42));
        assert_eq!(store.fetch::<u64>("missing").await.unwrap(), None);
        assert!(matches!(
            store.fetch::<u64>("").await,
            Err(StoreError::EmptyKey)
        ));
    }

    #[tokio::test]
    async fn test_operations_after_close() {
        let store = KvStore::new(MemoryEngine::new(), Encoding::Json);
        store.set("k", "v").await.unwrap();
        assert!(!store.is_closed().await);

        store.close().await.unwrap();
        assert!(store.is_closed().await);

        assert!(matches!(store.set("k", "v").await, Err(StoreError::Closed)));
        assert!(matches!(
            store.get("k", &mut String::new()).await,
            Err(StoreError::Closed)
        ));
        assert!(matches!(store.delete("k").await, Err(StoreError::Closed)));

        // Second close is a no-op.
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_validation_before_closed_check() {
        let store = KvStore::new(MemoryEngine::new(), Encoding::Json);
        store.close().await.unwrap();
        assert!(matches!(store.set("", "v").await, Err(StoreError::EmptyKey)));
    }

    #[tokio::test]
    async fn test_accessors_and_debug() {
        let store = KvStore::new(MemoryEngine::new(), Encoding::Cbor);
        assert_eq!(store.backend(), "memory");
        assert_eq!(store.codec(), &Encoding::Cbor);
        let debug = format!("{store:?}");
        assert!(debug.contains("memory"));
        assert!(debug.contains("cbor"));
    }
}
