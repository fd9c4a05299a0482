// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Backend-agnostic conformance suite for `Store` implementations.
//
// Every check is a plain async function generic over `S: Store`, so an adapter
// certifies itself by calling them against a fresh instance:
//
//     #[tokio::test]
//     async fn memory_conformance() {
//         let store = Arc::new(memory::open_store(MemoryOptions::default()).unwrap());
//         conformance::run_all(store, Encoding::Json.fidelity()).await;
//     }
//
// Checks panic on the first violation, like any other test assertion. Keys
// are random UUIDs, so checks can share one store (and one persistent
// database) without stepping on each other.
//
// | Check                        | Contract aspect                          |
// |------------------------------|------------------------------------------|
// | check_lifecycle              | absent / present / deleted reads         |
// | check_end_to_end             | the user1 round trip                     |
// | check_overwrite              | last set wins                            |
// | check_idempotent_delete      | repeated deletes succeed                 |
// | check_types                  | value-shape catalog, per-codec fidelity  |
// | check_codec_fidelity         | non-finite floats, composite map keys    |
// | check_error_paths            | validation errors, no side effects       |
// | check_deserialization_error  | shape mismatch on read                   |
// | check_concurrent_access      | get/set/get from many tasks at once      |
// | check_close                  | Open -> Closed transition                |

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::debug;
use uuid::Uuid;

use crate::codec::Fidelity;
use crate::error::StoreError;
use crate::store::Store;

/// Number of workers [`run_all`] hands to [`check_concurrent_access`].
pub const STRESS_WORKERS: usize = 1000;

/// A struct whose fields are all serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Foo {
    pub bar: String,
}

/// A struct with a field that never reaches the encoded form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InternalFoo {
    pub bar: String,
    #[serde(skip)]
    internal: String,
}

impl InternalFoo {
    /// Build a value with both the visible and the internal field set.
    pub fn new(bar: impl Into<String>, internal: impl Into<String>) -> Self {
        Self {
            bar: bar.into(),
            internal: internal.into(),
        }
    }

    /// The field excluded from serialization.
    pub fn internal(&self) -> &str {
        &self.internal
    }
}

fn unique_key(prefix: &str) -> String {
    format!("{prefix}:{}", Uuid::new_v4())
}

/// Write `value` under a fresh key and read it back into a default target.
async fn round_trip<S, T>(store: &S, label: &str, value: &T) -> T
where
    S: Store,
    T: Serialize + DeserializeOwned + Default + Send + Sync,
{
    let key = unique_key(label);
    store
        .set(&key, value)
        .await
        .unwrap_or_else(|e| panic!("set {label} failed: {e}"));

    let mut out = T::default();
    let found = store
        .get(&key, &mut out)
        .await
        .unwrap_or_else(|e| panic!("get {label} failed: {e}"));
    assert!(found, "{label} should be present after set");
    out
}

async fn assert_round_trip<S, T>(store: &S, label: &str, value: T)
where
    S: Store,
    T: Serialize + DeserializeOwned + Default + PartialEq + Debug + Send + Sync,
{
    let out = round_trip(store, label, &value).await;
    assert_eq!(out, value, "{label} changed across a round trip");
}

// ============================================================================
// Behaviour
// ============================================================================

/// Absent keys read as `Ok(false)`; set, get and delete behave as documented.
pub async fn check_lifecycle<S: Store>(store: &S) {
    let key = unique_key("lifecycle");

    let mut out = Foo::default();
    let found = store.get(&key, &mut out).await.expect("get of absent key");
    assert!(!found, "fresh key should be absent");
    assert_eq!(out, Foo::default(), "miss must leave the target untouched");

    store
        .delete(&unique_key("never-written"))
        .await
        .expect("delete of a never-written key should be a no-op");

    let value = Foo {
        bar: "lifecycle".to_string(),
    };
    store.set(&key, &value).await.expect("set");

    let found = store.get(&key, &mut out).await.expect("get after set");
    assert!(found, "key should be present after set");
    assert_eq!(out, value);

    store.delete(&key).await.expect("delete");
    let mut after = Foo::default();
    let found = store.get(&key, &mut after).await.expect("get after delete");
    assert!(!found, "key should be absent after delete");
}

/// `set("user1", Foo { bar: "baz" })`, read it back, delete it, miss.
///
/// Uses the literal key `user1`, so run it against a store where that key
/// is free.
pub async fn check_end_to_end<S: Store>(store: &S) {
    store
        .set(
            "user1",
            &Foo {
                bar: "baz".to_string(),
            },
        )
        .await
        .expect("set user1");

    let mut out = Foo::default();
    assert!(store.get("user1", &mut out).await.expect("get user1"));
    assert_eq!(out.bar, "baz");

    store.delete("user1").await.expect("delete user1");
    assert!(!store
        .get("user1", &mut Foo::default())
        .await
        .expect("get user1 after delete"));
}

/// A second `set` replaces the first value.
pub async fn check_overwrite<S: Store>(store: &S) {
    let key = unique_key("overwrite");
    store.set(&key, "original").await.expect("set");
    store.set(&key, "updated").await.expect("overwrite");

    let mut out = String::new();
    assert!(store.get(&key, &mut out).await.expect("get"));
    assert_eq!(out, "updated");
}

/// Deleting the same key twice succeeds both times.
pub async fn check_idempotent_delete<S: Store>(store: &S) {
    let key = unique_key("idempotent");
    store.set(&key, &1u8).await.expect("set");
    store.delete(&key).await.expect("first delete");
    store
        .delete(&key)
        .await
        .expect("second delete should be a no-op");
    assert!(!store.get(&key, &mut 0u8).await.expect("get"));
}

// ============================================================================
// Type coverage
// ============================================================================

/// Round-trip a fixed catalog of value shapes.
///
/// Structs whose fields are all serialized must come back equal. For
/// [`InternalFoo`] the internal field is compared only when
/// `fidelity.internal_fields` is set; otherwise it must come back as its
/// default while the visible field survives. The serde codecs shipped here
/// all take the second path.
pub async fn check_types<S: Store>(store: &S, fidelity: Fidelity) {
    assert_round_trip(store, "bool", true).await;
    assert_round_trip(store, "bool", false).await;
    assert_round_trip(store, "f64", 3.5f64).await;
    assert_round_trip(store, "f64", -0.015625f64).await;
    assert_round_trip(store, "i64", 42i64).await;
    assert_round_trip(store, "i64", i64::MIN).await;
    assert_round_trip(store, "i64", i64::MAX).await;
    assert_round_trip(store, "char", 'x').await;
    assert_round_trip(store, "char", 'λ').await;
    assert_round_trip(store, "string", "hello, world".to_string()).await;
    assert_round_trip(store, "string", "über ünïcödé ✓".to_string()).await;
    assert_round_trip(store, "string", String::new()).await;
    assert_round_trip(
        store,
        "struct",
        Foo {
            bar: "baz".to_string(),
        },
    )
    .await;

    assert_round_trip(store, "vec-bool", vec![true, false, true]).await;
    assert_round_trip(store, "vec-f64", vec![1.25f64, -2.5, 0.0]).await;
    assert_round_trip(store, "vec-i64", vec![-1i64, 0, 1, i64::MAX]).await;
    assert_round_trip(store, "vec-char", vec!['a', 'ß', '字']).await;
    assert_round_trip(
        store,
        "vec-string",
        vec!["one".to_string(), "two".to_string()],
    )
    .await;
    assert_round_trip(
        store,
        "vec-struct",
        vec![
            Foo {
                bar: "a".to_string(),
            },
            Foo {
                bar: "b".to_string(),
            },
        ],
    )
    .await;
    assert_round_trip(store, "bytes", vec![0u8, 1, 127, 255]).await;
    assert_round_trip(store, "vec-empty", Vec::<i64>::new()).await;
    assert_round_trip(
        store,
        "vec-vec-string",
        vec![
            vec!["a".to_string(), "b".to_string()],
            vec![],
            vec!["c".to_string()],
        ],
    )
    .await;

    let internal = InternalFoo::new("visible", "hidden");
    let out = round_trip(store, "internal-struct", &internal).await;
    assert_eq!(out.bar, "visible", "visible field must survive");
    if fidelity.internal_fields {
        assert_eq!(out, internal, "codec declares internal fields survive");
    } else {
        assert_eq!(
            out.internal(),
            "",
            "codec declares internal fields are dropped"
        );
    }

    let many = vec![InternalFoo::new("x", "1"), InternalFoo::new("y", "2")];
    let out = round_trip(store, "vec-internal-struct", &many).await;
    assert_eq!(
        out.iter().map(|f| f.bar.as_str()).collect::<Vec<_>>(),
        vec!["x", "y"]
    );
    if fidelity.internal_fields {
        assert_eq!(out, many);
    } else {
        assert!(out.iter().all(|f| f.internal().is_empty()));
    }
}

/// Shapes whose support differs between codecs.
///
/// When the codec declares support the value must round-trip. When it does
/// not, the store must report an error on `set` or on `get`; succeeding with
/// a different value is a violation.
pub async fn check_codec_fidelity<S: Store>(store: &S, fidelity: Fidelity) {
    for value in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
        let key = unique_key("non-finite");
        let mut out = 0.0f64;
        let read = match store.set(&key, &value).await {
            Ok(()) => store.get(&key, &mut out).await,
            Err(e) => Err(e),
        };

        if fidelity.non_finite_floats {
            assert!(
                read.expect("non-finite float should round-trip"),
                "{value} should be present"
            );
            if value.is_nan() {
                assert!(out.is_nan());
            } else {
                assert_eq!(out, value);
            }
        } else {
            let err = read.expect_err("non-finite float must not silently change");
            assert!(err.is_codec(), "expected a codec error, got: {err:?}");
        }
    }

    let mut map = BTreeMap::new();
    map.insert((1u8, 2u8), "one-two".to_string());
    map.insert((3u8, 4u8), "three-four".to_string());

    let key = unique_key("composite-keys");
    let mut out = BTreeMap::<(u8, u8), String>::new();
    let read = match store.set(&key, &map).await {
        Ok(()) => store.get(&key, &mut out).await,
        Err(e) => Err(e),
    };

    if fidelity.composite_map_keys {
        assert!(read.expect("composite map keys should round-trip"));
        assert_eq!(out, map);
    } else {
        let err = read.expect_err("composite map keys must not silently change");
        assert!(err.is_codec(), "expected a codec error, got: {err:?}");
    }
}

// ============================================================================
// Error paths
// ============================================================================

/// Empty keys and nil values are rejected before the engine is touched.
///
/// A missing `get` target cannot be expressed: `get` takes `&mut T`.
pub async fn check_error_paths<S: Store>(store: &S) {
    let err = store.set("", "value").await.expect_err("set with empty key");
    assert!(matches!(err, StoreError::EmptyKey), "got: {err:?}");

    let err = store
        .get("", &mut String::new())
        .await
        .expect_err("get with empty key");
    assert!(matches!(err, StoreError::EmptyKey), "got: {err:?}");

    let err = store.delete("").await.expect_err("delete with empty key");
    assert!(matches!(err, StoreError::EmptyKey), "got: {err:?}");

    // Empty key wins over nil value.
    let err = store
        .set("", &None::<Foo>)
        .await
        .expect_err("set with empty key and nil value");
    assert!(matches!(err, StoreError::EmptyKey), "got: {err:?}");

    let key = unique_key("nil");
    store.set(&key, "kept").await.expect("set");

    let err = store
        .set(&key, &None::<Foo>)
        .await
        .expect_err("set with None");
    assert!(matches!(err, StoreError::NilValue), "got: {err:?}");

    let err = store.set(&key, &()).await.expect_err("set with unit");
    assert!(matches!(err, StoreError::NilValue), "got: {err:?}");

    let mut out = String::new();
    assert!(store.get(&key, &mut out).await.expect("get"));
    assert_eq!(out, "kept", "rejected set must not touch the stored value");

    // `Some` is a value, not nil.
    store
        .set(&key, &Some(Foo::default()))
        .await
        .expect("Some is a value");
}

/// Reading a stored value into an incompatible type fails with
/// [`StoreError::Deserialization`] and leaves the target untouched.
pub async fn check_deserialization_error<S: Store>(store: &S) {
    let key = unique_key("mismatch");
    store
        .set(&key, "definitely not a bool")
        .await
        .expect("set");

    let mut out = true;
    let err = store
        .get(&key, &mut out)
        .await
        .expect_err("string read as bool");
    assert!(
        matches!(err, StoreError::Deserialization { .. }),
        "got: {err:?}"
    );
    assert!(out, "failed read must leave the target untouched");

    // A string read as an integer must fail too. Codecs without type tags
    // catch this only through unconsumed bytes.
    let key = unique_key("mismatch-int");
    store.set(&key, "hello").await.expect("set");

    let mut out = 9u8;
    let err = store
        .get(&key, &mut out)
        .await
        .expect_err("string read as integer");
    assert!(
        matches!(err, StoreError::Deserialization { .. }),
        "got: {err:?}"
    );
    assert_eq!(out, 9, "failed read must leave the target untouched");
}

// ============================================================================
// Concurrency
// ============================================================================

/// `workers` tasks each run get, set, get against one shared key.
///
/// Only the absence of errors is asserted. Whether a read finds the key,
/// and which writer's value it sees, depends on how the writers interleave
/// and on whether the engine evicts or expires entries.
pub async fn check_concurrent_access<S: Store + 'static>(store: Arc<S>, workers: usize) {
    let key = Arc::<str>::from(unique_key("concurrent"));
    let mut tasks = JoinSet::new();

    for i in 0..workers {
        let store = Arc::clone(&store);
        let key = Arc::clone(&key);
        tasks.spawn(async move {
            let mut out = Foo::default();
            store.get(&key, &mut out).await?;
            store
                .set(
                    &key,
                    &Foo {
                        bar: format!("worker-{i}"),
                    },
                )
                .await?;
            store.get(&key, &mut out).await
        });
    }

    let mut errors = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined.expect("worker panicked") {
            errors.push(e);
        }
    }
    assert!(
        errors.is_empty(),
        "{} of {workers} workers failed, first: {:?}",
        errors.len(),
        errors.first()
    );

    debug!(workers, "concurrent access check passed");
}

// ============================================================================
// Lifecycle end
// ============================================================================

/// Close the store, then check that it stays closed.
///
/// Every later operation fails with [`StoreError::Closed`]; closing again
/// succeeds.
pub async fn check_close<S: Store>(store: &S) {
    store.close().await.expect("close");

    let err = store.set("k", "v").await.expect_err("set after close");
    assert!(matches!(err, StoreError::Closed), "got: {err:?}");

    let err = store
        .get("k", &mut String::new())
        .await
        .expect_err("get after close");
    assert!(matches!(err, StoreError::Closed), "got: {err:?}");

    let err = store.delete("k").await.expect_err("delete after close");
    assert!(matches!(err, StoreError::Closed), "got: {err:?}");

    // Validation still runs first.
    let err = store.set("", "v").await.expect_err("empty key after close");
    assert!(matches!(err, StoreError::EmptyKey), "got: {err:?}");

    store.close().await.expect("second close is a no-op");
}

// ============================================================================
// Convenience runner
// ============================================================================

/// Run every check in sequence against one store, closing it at the end.
///
/// ```no_run
/// use std::sync::Arc;
/// use omnikv_store::conformance;
/// use omnikv_store::memory::{self, MemoryOptions};
/// use omnikv_store::{Codec, Encoding};
///
/// #[tokio::test]
/// async fn memory_conformance() {
///     let store = Arc::new(memory::open_store(MemoryOptions::default()).unwrap());
///     conformance::run_all(store, Encoding::Json.fidelity()).await;
/// }
/// ```
pub async fn run_all<S: Store + 'static>(store: Arc<S>, fidelity: Fidelity) {
    check_lifecycle(store.as_ref()).await;
    check_end_to_end(store.as_ref()).await;
    check_overwrite(store.as_ref()).await;
    check_idempotent_delete(store.as_ref()).await;

    check_types(store.as_ref(), fidelity).await;
    check_codec_fidelity(store.as_ref(), fidelity).await;

    check_error_paths(store.as_ref()).await;
    check_deserialization_error(store.as_ref()).await;

    check_concurrent_access(Arc::clone(&store), STRESS_WORKERS).await;

    check_close(store.as_ref()).await;
}
