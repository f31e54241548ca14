//! Wire encoding at the client/transport boundary.
//!
//! Payloads cross the boundary as JSON-compatible data only. serde_json
//! silently encodes non-finite floats as `null`, which would corrupt a
//! payload instead of failing it, so [`to_wire`] first walks the value with a
//! guard serializer that rejects NaN and infinities with a serialization
//! error.

use serde::de::DeserializeOwned;
use serde::ser::{self, Serialize};
use std::fmt::{self, Display};

use crate::{RpcError, RpcResult};

/// Encode a value for the wire, rejecting anything JSON cannot represent.
pub fn to_wire<T: Serialize>(value: &T) -> RpcResult<serde_json::Value> {
    value
        .serialize(FloatGuard)
        .map_err(|e| RpcError::serialization(format!("value is not representable on the wire: {}", e)))?;
    serde_json::to_value(value)
        .map_err(|e| RpcError::serialization(format!("JSON encoding failed: {}", e)))
}

/// Decode a typed value off the wire.
pub fn from_wire<T: DeserializeOwned>(value: serde_json::Value) -> RpcResult<T> {
    serde_json::from_value(value)
        .map_err(|e| RpcError::serialization(format!("JSON decoding failed: {}", e)))
}

/// Error raised by the guard serializer.
#[derive(Debug)]
pub struct NotWireSafe(String);

impl Display for NotWireSafe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for NotWireSafe {}

impl ser::Error for NotWireSafe {
    fn custom<T: Display>(msg: T) -> Self {
        NotWireSafe(msg.to_string())
    }
}

/// Serializer that only checks float finiteness and otherwise accepts
/// everything. Structure is walked recursively; no output is produced.
struct FloatGuard;

macro_rules! guard_ok {
    ($($method:ident: $ty:ty),* $(,)?) => {
        $(
            fn $method(self, _v: $ty) -> Result<(), NotWireSafe> {
                Ok(())
            }
        )*
    };
}

impl ser::Serializer for FloatGuard {
    type Ok = ();
    type Error = NotWireSafe;
    type SerializeSeq = FloatGuard;
    type SerializeTuple = FloatGuard;
    type SerializeTupleStruct = FloatGuard;
    type SerializeTupleVariant = FloatGuard;
    type SerializeMap = FloatGuard;
    type SerializeStruct = FloatGuard;
    type SerializeStructVariant = FloatGuard;

    guard_ok! {
        serialize_bool: bool,
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
        serialize_char: char,
        serialize_str: &str,
        serialize_bytes: &[u8],
    }

    fn serialize_f32(self, v: f32) -> Result<(), NotWireSafe> {
        if v.is_finite() {
            Ok(())
        } else {
            Err(NotWireSafe(format!("non-finite number {} has no JSON form", v)))
        }
    }

    fn serialize_f64(self, v: f64) -> Result<(), NotWireSafe> {
        if v.is_finite() {
            Ok(())
        } else {
            Err(NotWireSafe(format!("non-finite number {} has no JSON form", v)))
        }
    }

    fn serialize_none(self) -> Result<(), NotWireSafe> {
        Ok(())
    }

    fn serialize_some<T>(self, value: &T) -> Result<(), NotWireSafe>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FloatGuard)
    }

    fn serialize_unit(self) -> Result<(), NotWireSafe> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), NotWireSafe> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
    ) -> Result<(), NotWireSafe> {
        Ok(())
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<(), NotWireSafe>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FloatGuard)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<(), NotWireSafe>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FloatGuard)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<FloatGuard, NotWireSafe> {
        Ok(FloatGuard)
    }

    fn serialize_tuple(self, _len: usize) -> Result<FloatGuard, NotWireSafe> {
        Ok(FloatGuard)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<FloatGuard, NotWireSafe> {
        Ok(FloatGuard)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<FloatGuard, NotWireSafe> {
        Ok(FloatGuard)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<FloatGuard, NotWireSafe> {
        Ok(FloatGuard)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<FloatGuard, NotWireSafe> {
        Ok(FloatGuard)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<FloatGuard, NotWireSafe> {
        Ok(FloatGuard)
    }
}

impl ser::SerializeSeq for FloatGuard {
    type Ok = ();
    type Error = NotWireSafe;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), NotWireSafe>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FloatGuard)
    }

    fn end(self) -> Result<(), NotWireSafe> {
        Ok(())
    }
}

impl ser::SerializeTuple for FloatGuard {
    type Ok = ();
    type Error = NotWireSafe;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), NotWireSafe>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FloatGuard)
    }

    fn end(self) -> Result<(), NotWireSafe> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for FloatGuard {
    type Ok = ();
    type Error = NotWireSafe;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), NotWireSafe>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FloatGuard)
    }

    fn end(self) -> Result<(), NotWireSafe> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for FloatGuard {
    type Ok = ();
    type Error = NotWireSafe;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), NotWireSafe>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FloatGuard)
    }

    fn end(self) -> Result<(), NotWireSafe> {
        Ok(())
    }
}

impl ser::SerializeMap for FloatGuard {
    type Ok = ();
    type Error = NotWireSafe;

    fn serialize_key<T>(&mut self, key: &T) -> Result<(), NotWireSafe>
    where
        T: ?Sized + Serialize,
    {
        key.serialize(FloatGuard)
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<(), NotWireSafe>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FloatGuard)
    }

    fn end(self) -> Result<(), NotWireSafe> {
        Ok(())
    }
}

impl ser::SerializeStruct for FloatGuard {
    type Ok = ();
    type Error = NotWireSafe;

    fn serialize_field<T>(&mut self, _key: &'static str, value: &T) -> Result<(), NotWireSafe>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FloatGuard)
    }

    fn end(self) -> Result<(), NotWireSafe> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FloatGuard {
    type Ok = ();
    type Error = NotWireSafe;

    fn serialize_field<T>(&mut self, _key: &'static str, value: &T) -> Result<(), NotWireSafe>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FloatGuard)
    }

    fn end(self) -> Result<(), NotWireSafe> {
        Ok(())
    }
}
