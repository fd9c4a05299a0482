// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// omnikv Store Contract
//
// This crate defines one key-value contract, `Store`, that application code
// programs against regardless of the engine underneath. A store is an engine
// (raw bytes by key) paired with a codec (serde values to bytes), with shared
// validation in front of both. Swapping an LSM tree for a cache or a
// transactional database is a change of constructor, not of call sites.
//
// # Modules
//
// - [`store`] -- The `Store` trait and `KvStore`, its generic implementation.
// - [`engine`] -- The `Engine` trait every storage adapter implements.
// - [`codec`] -- The `Codec` trait, JSON/CBOR/postcard codecs and their
//   declared round-trip fidelity.
// - [`validation`] -- Key and nil-value checks run before any engine access.
// - [`error`] -- `StoreError` and `ConfigError`.
// - [`memory`] -- A `HashMap` engine for tests and ephemeral data.
// - [`metrics`] -- A transparent `Store` wrapper collecting statistics.
// - [`conformance`] -- The backend-agnostic conformance suite.
// - `redb_backend`, `sled_backend`, `moka_backend` -- Engine adapters, each
//   behind a cargo feature of the same name (all on by default).
//
// # Example
//
// ```rust
// use omnikv_store::memory::{self, MemoryOptions};
// use omnikv_store::{Encoding, Store};
//
// # tokio_test::block_on(async {
// let store = memory::open_store(MemoryOptions {
//     codec: Some(Encoding::Cbor),
// })
// .unwrap();
//
// store.set("answer", &42u32).await.unwrap();
//
// let mut out = 0u32;
// assert!(store.get("answer", &mut out).await.unwrap());
// assert_eq!(out, 42);
//
// store.close().await.unwrap();
// # });
// ```

pub mod codec;
pub mod conformance;
pub mod engine;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod store;
pub mod validation;

// Engine adapters, each behind its own feature.
#[cfg(feature = "moka-backend")]
pub mod moka_backend;
#[cfg(feature = "redb-backend")]
pub mod redb_backend;
#[cfg(feature = "sled-backend")]
pub mod sled_backend;

pub use codec::{CborCodec, Codec, Encoding, Fidelity, JsonCodec, PostcardCodec};
pub use engine::Engine;
pub use error::{BoxError, ConfigError, StoreError, StoreResult};
pub use memory::{MemoryEngine, MemoryStore};
pub use metrics::{MetricsStore, StoreStats};
pub use store::{KvStore, Store};
pub use validation::{check_key, check_key_and_value};

#[cfg(feature = "moka-backend")]
pub use moka_backend::{MokaEngine, MokaStore};
#[cfg(feature = "redb-backend")]
pub use redb_backend::{RedbEngine, RedbStore};
#[cfg(feature = "sled-backend")]
pub use sled_backend::{SledEngine, SledStore};
