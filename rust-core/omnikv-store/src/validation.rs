// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Input validation shared by every store.
//
// `KvStore` runs these checks before it looks at the engine, so a rejected
// call never has engine-level side effects.
//
// A value is nil when its serde representation is `none` or `unit`. The
// check walks only the outermost layer of the value through a probe
// serializer; nested data is never visited.
//
// Read targets are `&mut T`, so a null target is rejected by the compiler
// rather than here; see `Store::get`.

use std::fmt;

use serde::ser::{self, Impossible, Serialize, Serializer};

use crate::error::{StoreError, StoreResult};

/// Reject an empty key.
pub fn check_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::EmptyKey);
    }
    Ok(())
}

/// Reject an empty key, then a nil value.
pub fn check_key_and_value<T>(key: &str, value: &T) -> StoreResult<()>
where
    T: Serialize + ?Sized,
{
    check_key(key)?;
    if is_nil(value) {
        return Err(StoreError::NilValue);
    }
    Ok(())
}

/// True when `value` serializes as `none` or `unit`.
///
/// `Some(_)` is never nil, whatever it wraps. Newtype wrappers are looked
/// through. Values whose `Serialize` impl fails are reported as not nil so
/// that the codec can surface the real error.
pub fn is_nil<T>(value: &T) -> bool
where
    T: Serialize + ?Sized,
{
    matches!(value.serialize(NilProbe), Ok(true))
}

/// Short-circuit marker for anything that is definitely not nil.
#[derive(Debug)]
struct Present;

impl fmt::Display for Present {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("value is present")
    }
}

impl std::error::Error for Present {}

impl ser::Error for Present {
    fn custom<M: fmt::Display>(_msg: M) -> Self {
        Present
    }
}

/// Serializer answering a single question: is the top-level value nil?
struct NilProbe;

impl Serializer for NilProbe {
    type Ok = bool;
    type Error = Present;

    type SerializeSeq = Impossible<bool, Present>;
    type SerializeTuple = Impossible<bool, Present>;
    type SerializeTupleStruct = Impossible<bool, Present>;
    type SerializeTupleVariant = Impossible<bool, Present>;
    type SerializeMap = Impossible<bool, Present>;
    type SerializeStruct = Impossible<bool, Present>;
    type SerializeStructVariant = Impossible<bool, Present>;

    fn serialize_none(self) -> Result<bool, Present> {
        Ok(true)
    }

    fn serialize_unit(self) -> Result<bool, Present> {
        Ok(true)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, _value: &T) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<bool, Present> {
        value.serialize(self)
    }

    fn serialize_bool(self, _v: bool) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_i8(self, _v: i8) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_i16(self, _v: i16) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_i32(self, _v: i32) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_i64(self, _v: i64) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_u8(self, _v: u8) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_u16(self, _v: u16) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_u32(self, _v: u32) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_u64(self, _v: u64) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_f32(self, _v: f32) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_f64(self, _v: f64) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_char(self, _v: char) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_str(self, _v: &str) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<bool, Present> {
        Ok(false)
    }

    // Compound values are present by construction; bail out before any
    // element is visited.

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Present> {
        Err(Present)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Present> {
        Err(Present)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Present> {
        Err(Present)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Present> {
        Err(Present)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Present> {
        Err(Present)
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Present> {
        Err(Present)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Present> {
        Err(Present)
    }
}
