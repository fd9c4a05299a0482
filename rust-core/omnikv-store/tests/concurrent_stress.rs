// SPDX-License-Identifier: PMPL-1.0-or-later
//! Concurrent access stress tests for the shipped stores.
//!
//! These go beyond the conformance suite's get/set/get check: many writers
//! hammer one key with large values, readers run alongside, and every value
//! read back must be exactly one that some writer wrote.

use std::sync::Arc;

use omnikv_store::memory::{self, MemoryOptions};
use omnikv_store::{Encoding, Store, StoreResult};
use tokio::task::JoinSet;

/// Number of concurrent writer tasks.
const WRITERS: usize = 16;

/// Number of concurrent reader tasks.
const READERS: usize = 16;

/// Writes per writer task.
const OPS_PER_TASK: usize = 50;

/// Length of each written vector; large enough to span many engine pages.
const VALUE_LEN: usize = 4096;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A value whose every element names the writer and the round.
fn make_value(task: usize, round: usize) -> Vec<u64> {
    vec![((task as u64) << 32) | round as u64; VALUE_LEN]
}

fn assert_untorn(value: &[u64]) {
    assert_eq!(value.len(), VALUE_LEN, "value truncated");
    let first = value[0];
    assert!(
        value.iter().all(|&v| v == first),
        "value mixes elements from different writes"
    );
}

/// Writers and readers race on one key; no read may observe a torn value.
async fn writers_and_readers_same_key<S: Store + 'static>(store: Arc<S>) {
    let key = "shared-key";
    store.set(key, &make_value(WRITERS, 0)).await.unwrap();

    let mut set: JoinSet<StoreResult<()>> = JoinSet::new();
    for task in 0..WRITERS {
        let store = Arc::clone(&store);
        set.spawn(async move {
            for round in 0..OPS_PER_TASK {
                store.set(key, &make_value(task, round)).await?;
            }
            Ok(())
        });
    }
    for _ in 0..READERS {
        let store = Arc::clone(&store);
        set.spawn(async move {
            for _ in 0..OPS_PER_TASK {
                let mut out = Vec::<u64>::new();
                assert!(store.get(key, &mut out).await?, "key vanished");
                assert_untorn(&out);
            }
            Ok(())
        });
    }

    while let Some(result) = set.join_next().await {
        result.expect("task should not panic").expect("no store errors");
    }

    let mut last = Vec::<u64>::new();
    assert!(store.get(key, &mut last).await.unwrap());
    assert_untorn(&last);
}

/// Each task owns a disjoint key range and interleaves set, get and delete.
async fn mixed_workload_disjoint_keys<S: Store + 'static>(store: Arc<S>) {
    let mut set: JoinSet<StoreResult<()>> = JoinSet::new();
    for task in 0..WRITERS {
        let store = Arc::clone(&store);
        set.spawn(async move {
            for i in 0..OPS_PER_TASK {
                let key = format!("mixed:{task}:{i}");
                store.set(&key, &(task, i)).await?;

                let mut out = (0usize, 0usize);
                assert!(store.get(&key, &mut out).await?);
                assert_eq!(out, (task, i));

                if i % 2 == 0 {
                    store.delete(&key).await?;
                }
            }
            Ok(())
        });
    }
    while let Some(result) = set.join_next().await {
        result.expect("task should not panic").expect("no store errors");
    }

    for task in 0..WRITERS {
        for i in 0..OPS_PER_TASK {
            let key = format!("mixed:{task}:{i}");
            let found = store.get(&key, &mut (0usize, 0usize)).await.unwrap();
            assert_eq!(found, i % 2 == 1, "unexpected presence for {key}");
        }
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn memory_writers_and_readers_same_key() {
    let store = memory::open_store(MemoryOptions {
        codec: Some(Encoding::Postcard),
    })
    .unwrap();
    writers_and_readers_same_key(Arc::new(store)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn memory_mixed_workload() {
    let store = memory::open_store(MemoryOptions::default()).unwrap();
    mixed_workload_disjoint_keys(Arc::new(store)).await;
}

// ---------------------------------------------------------------------------
// Engine adapters
// ---------------------------------------------------------------------------

#[cfg(feature = "redb-backend")]
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn redb_writers_and_readers_same_key() {
    use omnikv_store::redb_backend::{self, RedbOptions};

    let dir = tempfile::tempdir().unwrap();
    let store = redb_backend::open_store(RedbOptions {
        path: Some(dir.path().join("stress.redb")),
        codec: Some(Encoding::Cbor),
        ..Default::default()
    })
    .unwrap();
    writers_and_readers_same_key(Arc::new(store)).await;
}

#[cfg(feature = "sled-backend")]
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn sled_mixed_workload() {
    use omnikv_store::sled_backend::{self, SledOptions};

    let dir = tempfile::tempdir().unwrap();
    let store = sled_backend::open_store(SledOptions {
        path: Some(dir.path().join("db")),
        ..Default::default()
    })
    .unwrap();
    let store = Arc::new(store);
    mixed_workload_disjoint_keys(Arc::clone(&store)).await;
    writers_and_readers_same_key(store).await;
}

#[cfg(feature = "moka-backend")]
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn moka_writers_and_readers_same_key() {
    use omnikv_store::moka_backend::{self, MokaOptions};

    let store = moka_backend::open_store(MokaOptions {
        codec: Some(Encoding::Postcard),
        ..Default::default()
    })
    .unwrap();
    writers_and_readers_same_key(Arc::new(store)).await;
}
