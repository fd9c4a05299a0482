// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Value codecs for omnikv.
//
// A codec turns a serde value into bytes for the engine and back. Codecs are
// stateless and know nothing about engines, so one codec value can serve any
// number of stores. Each codec declares a `Fidelity` describing which shapes
// survive a round trip; stores and the conformance harness rely on that
// declaration instead of assuming every format behaves like JSON.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Which value shapes survive a round trip through a codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fidelity {
    /// Fields excluded from serialization (`#[serde(skip)]`) come back with
    /// their original value instead of their default.
    ///
    /// `#[serde(skip)]` removes the field before any format sees it, so every
    /// serde codec in this crate declares `false`. The flag exists for codecs
    /// that encode values some other way.
    pub internal_fields: bool,
    /// `f64::INFINITY`, `f64::NEG_INFINITY` and `NaN` survive.
    pub non_finite_floats: bool,
    /// Maps whose keys are not strings or integers can be encoded.
    pub composite_map_keys: bool,
}

/// Bidirectional transform between serde values and bytes.
pub trait Codec: Send + Sync {
    /// Short codec name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Round-trip guarantees of this codec.
    fn fidelity(&self) -> Fidelity;

    /// Serialize `value` to bytes.
    fn marshal<T>(&self, value: &T) -> StoreResult<Vec<u8>>
    where
        T: Serialize + ?Sized;

    /// Deserialize bytes into a new value.
    fn decode<T>(&self, bytes: &[u8]) -> StoreResult<T>
    where
        T: DeserializeOwned;

    /// Deserialize bytes into `out`. `out` is left untouched on failure.
    fn unmarshal<T>(&self, bytes: &[u8], out: &mut T) -> StoreResult<()>
    where
        T: DeserializeOwned,
    {
        *out = self.decode(bytes)?;
        Ok(())
    }
}

impl<C: Codec> Codec for Arc<C> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn fidelity(&self) -> Fidelity {
        (**self).fidelity()
    }

    fn marshal<T>(&self, value: &T) -> StoreResult<Vec<u8>>
    where
        T: Serialize + ?Sized,
    {
        (**self).marshal(value)
    }

    fn decode<T>(&self, bytes: &[u8]) -> StoreResult<T>
    where
        T: DeserializeOwned,
    {
        (**self).decode(bytes)
    }
}

/// JSON via `serde_json`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn fidelity(&self) -> Fidelity {
        // Non-finite floats are written as `null` and cannot be read back
        // into a float; map keys must be strings.
        Fidelity {
            internal_fields: false,
            non_finite_floats: false,
            composite_map_keys: false,
        }
    }

    fn marshal<T>(&self, value: &T) -> StoreResult<Vec<u8>>
    where
        T: Serialize + ?Sized,
    {
        serde_json::to_vec(value).map_err(|err| StoreError::Serialization {
            codec: self.name(),
            message: err.to_string(),
        })
    }

    fn decode<T>(&self, bytes: &[u8]) -> StoreResult<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(bytes).map_err(|err| StoreError::Deserialization {
            codec: self.name(),
            message: err.to_string(),
        })
    }
}

/// CBOR via `ciborium`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CborCodec;

impl Codec for CborCodec {
    fn name(&self) -> &'static str {
        "cbor"
    }

    fn fidelity(&self) -> Fidelity {
        Fidelity {
            internal_fields: false,
            non_finite_floats: true,
            composite_map_keys: true,
        }
    }

    fn marshal<T>(&self, value: &T) -> StoreResult<Vec<u8>>
    where
        T: Serialize + ?Sized,
    {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf).map_err(|err| StoreError::Serialization {
            codec: self.name(),
            message: err.to_string(),
        })?;
        Ok(buf)
    }

    fn decode<T>(&self, bytes: &[u8]) -> StoreResult<T>
    where
        T: DeserializeOwned,
    {
        let mut reader = bytes;
        let value = ciborium::from_reader(&mut reader).map_err(|err| {
            StoreError::Deserialization {
                codec: self.name(),
                message: err.to_string(),
            }
        })?;
        if !reader.is_empty() {
            return Err(trailing_bytes(self.name(), reader.len()));
        }
        Ok(value)
    }
}

/// Compact, non-self-describing binary via `postcard`.
///
/// Postcard has no type tags, so a mismatched read is caught only when it
/// fails to parse or leaves bytes unconsumed. Both are reported as
/// [`StoreError::Deserialization`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostcardCodec;

impl Codec for PostcardCodec {
    fn name(&self) -> &'static str {
        "postcard"
    }

    fn fidelity(&self) -> Fidelity {
        Fidelity {
            internal_fields: false,
            non_finite_floats: true,
            composite_map_keys: true,
        }
    }

    fn marshal<T>(&self, value: &T) -> StoreResult<Vec<u8>>
    where
        T: Serialize + ?Sized,
    {
        postcard::to_allocvec(value).map_err(|err| StoreError::Serialization {
            codec: self.name(),
            message: err.to_string(),
        })
    }

    fn decode<T>(&self, bytes: &[u8]) -> StoreResult<T>
    where
        T: DeserializeOwned,
    {
        let (value, rest) =
            postcard::take_from_bytes(bytes).map_err(|err| StoreError::Deserialization {
                codec: self.name(),
                message: err.to_string(),
            })?;
        if !rest.is_empty() {
            return Err(trailing_bytes(self.name(), rest.len()));
        }
        Ok(value)
    }
}

/// A decode that stops short of the end read the bytes as the wrong shape.
fn trailing_bytes(codec: &'static str, remaining: usize) -> StoreError {
    StoreError::Deserialization {
        codec,
        message: format!("{remaining} trailing bytes after value"),
    }
}

/// Codec selected by configuration.
///
/// Deserializes from `"json"`, `"cbor"` or `"postcard"`; adapters default to
/// [`Encoding::Json`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// [`JsonCodec`].
    #[default]
    Json,
    /// [`CborCodec`].
    Cbor,
    /// [`PostcardCodec`].
    Postcard,
}

impl Codec for Encoding {
    fn name(&self) -> &'static str {
        match self {
            Encoding::Json => JsonCodec.name(),
            Encoding::Cbor => CborCodec.name(),
            Encoding::Postcard => PostcardCodec.name(),
        }
    }

    fn fidelity(&self) -> Fidelity {
        match self {
            Encoding::Json => JsonCodec.fidelity(),
            Encoding::Cbor => CborCodec.fidelity(),
            Encoding::Postcard => PostcardCodec.fidelity(),
        }
    }

    fn marshal<T>(&self, value: &T) -> StoreResult<Vec<u8>>
    where
        T: Serialize + ?Sized,
    {
        match self {
            Encoding::Json => JsonCodec.marshal(value),
            Encoding::Cbor => CborCodec.marshal(value),
            Encoding::Postcard => PostcardCodec.marshal(value),
        }
    }

    fn decode<T>(&self, bytes: &[u8]) -> StoreResult<T>
    where
        T: DeserializeOwned,
    {
        match self {
            Encoding::Json => JsonCodec.decode(bytes),
            Encoding::Cbor => CborCodec.decode(bytes),
            Encoding::Postcard => PostcardCodec.decode(bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Foo {
        bar: String,
    }

    const ALL: [Encoding; 3] = [Encoding::Json, Encoding::Cbor, Encoding::Postcard];

    #[test]
    fn test_struct_round_trip_every_encoding() {
        for encoding in ALL {
            let foo = Foo {
                bar: "baz".to_string(),
            };
            let bytes = encoding.marshal(&foo).unwrap();
            let back: Foo = encoding.decode(&bytes).unwrap();
            assert_eq!(back, foo, "{} round trip", encoding.name());
        }
    }

    #[test]
    fn test_unmarshal_in_place() {
        let bytes = JsonCodec.marshal(&vec![1u32, 2, 3]).unwrap();
        let mut out = vec![9u32];
        JsonCodec.unmarshal(&bytes, &mut out).unwrap();
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[test]
    fn test_unmarshal_failure_leaves_target() {
        let mut out = Foo {
            bar: "kept".to_string(),
        };
        let err = JsonCodec.unmarshal(b"not json", &mut out).unwrap_err();
        assert!(matches!(err, StoreError::Deserialization { codec: "json", .. }));
        assert_eq!(out.bar, "kept");
    }

    #[test]
    fn test_json_rejects_composite_map_keys() {
        let mut map = BTreeMap::new();
        map.insert((1, 2), "a");
        let err = JsonCodec.marshal(&map).unwrap_err();
        assert!(matches!(err, StoreError::Serialization { codec: "json", .. }));

        let bytes = CborCodec.marshal(&map).unwrap();
        let back: BTreeMap<(i32, i32), String> = CborCodec.decode(&bytes).unwrap();
        assert_eq!(back.get(&(1, 2)).map(String::as_str), Some("a"));
    }

    #[test]
    fn test_string_read_as_integer_fails_every_encoding() {
        for encoding in ALL {
            let bytes = encoding.marshal("hello").unwrap();
            let err = encoding.decode::<u8>(&bytes).unwrap_err();
            assert!(
                matches!(err, StoreError::Deserialization { .. }),
                "{}: {err:?}",
                encoding.name()
            );

            let mut out = 9u8;
            assert!(encoding.unmarshal(&bytes, &mut out).is_err());
            assert_eq!(out, 9, "{} touched the target", encoding.name());
        }
    }

    #[test]
    fn test_binary_codecs_reject_trailing_bytes() {
        for encoding in [Encoding::Cbor, Encoding::Postcard] {
            let mut bytes = encoding.marshal(&7u32).unwrap();
            assert_eq!(encoding.decode::<u32>(&bytes).unwrap(), 7);

            bytes.push(0);
            let err = encoding.decode::<u32>(&bytes).unwrap_err();
            match err {
                StoreError::Deserialization { message, .. } => {
                    assert!(message.contains("trailing"), "{message}")
                }
                other => panic!("expected Deserialization, got: {other:?}"),
            }
        }
    }

    #[test]
    fn test_json_loses_non_finite_floats() {
        let bytes = JsonCodec.marshal(&f64::INFINITY).unwrap();
        assert_eq!(bytes, b"null");
        assert!(JsonCodec.decode::<f64>(&bytes).is_err());

        for codec in [Encoding::Cbor, Encoding::Postcard] {
            let bytes = codec.marshal(&f64::NEG_INFINITY).unwrap();
            assert_eq!(codec.decode::<f64>(&bytes).unwrap(), f64::NEG_INFINITY);
        }
    }

    #[test]
    fn test_skipped_fields_dropped_by_every_encoding() {
        #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
        struct WithSkipped {
            bar: String,
            #[serde(skip)]
            hidden: u32,
        }

        for encoding in ALL {
            assert!(!encoding.fidelity().internal_fields);

            let value = WithSkipped {
                bar: "kept".to_string(),
                hidden: 7,
            };
            let bytes = encoding.marshal(&value).unwrap();
            let back: WithSkipped = encoding.decode(&bytes).unwrap();
            assert_eq!(back.bar, "kept");
            assert_eq!(back.hidden, 0, "{} kept a skipped field", encoding.name());
        }
    }

    #[test]
    fn test_fidelity_declarations_match_encoding() {
        assert_eq!(Encoding::Json.fidelity(), JsonCodec.fidelity());
        assert_eq!(Encoding::Cbor.fidelity(), CborCodec.fidelity());
        assert_eq!(Encoding::Postcard.fidelity(), PostcardCodec.fidelity());
        assert!(!JsonCodec.fidelity().non_finite_floats);
        assert!(CborCodec.fidelity().non_finite_floats);
    }

    #[test]
    fn test_shared_codec_through_arc() {
        let shared = Arc::new(CborCodec);
        let a = Arc::clone(&shared);
        let bytes = a.marshal("hello").unwrap();
        let back: String = shared.decode(&bytes).unwrap();
        assert_eq!(back, "hello");
        assert_eq!(a.name(), "cbor");
    }

    #[test]
    fn test_encoding_from_config() {
        let enc: Encoding = serde_json::from_str("\"postcard\"").unwrap();
        assert_eq!(enc, Encoding::Postcard);
        assert_eq!(Encoding::default(), Encoding::Json);
    }
}
