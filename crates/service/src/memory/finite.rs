//! Walks a `Serialize` value and rejects NaN and infinite floats, which
//! `serde_json` would otherwise quietly store as `null`.

use std::fmt;

use serde::ser::{self, Serialize};

#[derive(Debug)]
pub struct NonFinite(pub String);

impl fmt::Display for NonFinite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for NonFinite {}

impl ser::Error for NonFinite {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        NonFinite(msg.to_string())
    }
}

/// `Ok(())` when every float in `value` is finite.
pub fn check<T: Serialize + ?Sized>(value: &T) -> Result<(), NonFinite> {
    value.serialize(FiniteCheck)
}

fn float(v: f64) -> Result<(), NonFinite> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(NonFinite(format!("{v} has no JSON representation")))
    }
}

#[derive(Clone, Copy)]
struct FiniteCheck;

type Checked = Result<(), NonFinite>;

impl ser::Serializer for FiniteCheck {
    type Ok = ();
    type Error = NonFinite;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, _: bool) -> Checked { Ok(()) }
    fn serialize_i8(self, _: i8) -> Checked { Ok(()) }
    fn serialize_i16(self, _: i16) -> Checked { Ok(()) }
    fn serialize_i32(self, _: i32) -> Checked { Ok(()) }
    fn serialize_i64(self, _: i64) -> Checked { Ok(()) }
    fn serialize_i128(self, _: i128) -> Checked { Ok(()) }
    fn serialize_u8(self, _: u8) -> Checked { Ok(()) }
    fn serialize_u16(self, _: u16) -> Checked { Ok(()) }
    fn serialize_u32(self, _: u32) -> Checked { Ok(()) }
    fn serialize_u64(self, _: u64) -> Checked { Ok(()) }
    fn serialize_u128(self, _: u128) -> Checked { Ok(()) }
    fn serialize_f32(self, v: f32) -> Checked { float(v as f64) }
    fn serialize_f64(self, v: f64) -> Checked { float(v) }
    fn serialize_char(self, _: char) -> Checked { Ok(()) }
    fn serialize_str(self, _: &str) -> Checked { Ok(()) }
    fn serialize_bytes(self, _: &[u8]) -> Checked { Ok(()) }
    fn serialize_none(self) -> Checked { Ok(()) }
    fn serialize_unit(self) -> Checked { Ok(()) }
    fn serialize_unit_struct(self, _: &'static str) -> Checked { Ok(()) }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Checked {
        value.serialize(self)
    }

    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Checked {
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(self, _: &'static str, value: &T) -> Checked {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> Checked {
        value.serialize(self)
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Self, NonFinite> { Ok(self) }
    fn serialize_tuple(self, _: usize) -> Result<Self, NonFinite> { Ok(self) }

    fn serialize_tuple_struct(self, _: &'static str, _: usize) -> Result<Self, NonFinite> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self, NonFinite> {
        Ok(self)
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self, NonFinite> { Ok(self) }

    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self, NonFinite> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self, NonFinite> {
        Ok(self)
    }
}

impl ser::SerializeSeq for FiniteCheck {
    type Ok = ();
    type Error = NonFinite;
    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Checked { value.serialize(*self) }
    fn end(self) -> Checked { Ok(()) }
}

impl ser::SerializeTuple for FiniteCheck {
    type Ok = ();
    type Error = NonFinite;
    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Checked { value.serialize(*self) }
    fn end(self) -> Checked { Ok(()) }
}

impl ser::SerializeTupleStruct for FiniteCheck {
    type Ok = ();
    type Error = NonFinite;
    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Checked { value.serialize(*self) }
    fn end(self) -> Checked { Ok(()) }
}

impl ser::SerializeTupleVariant for FiniteCheck {
    type Ok = ();
    type Error = NonFinite;
    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Checked { value.serialize(*self) }
    fn end(self) -> Checked { Ok(()) }
}

impl ser::SerializeMap for FiniteCheck {
    type Ok = ();
    type Error = NonFinite;
    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Checked { key.serialize(*self) }
    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Checked { value.serialize(*self) }
    fn end(self) -> Checked { Ok(()) }
}

impl ser::SerializeStruct for FiniteCheck {
    type Ok = ();
    type Error = NonFinite;
    fn serialize_field<T: Serialize + ?Sized>(&mut self, _: &'static str, value: &T) -> Checked {
        value.serialize(*self)
    }
    fn end(self) -> Checked { Ok(()) }
}

impl ser::SerializeStructVariant for FiniteCheck {
    type Ok = ();
    type Error = NonFinite;
    fn serialize_field<T: Serialize + ?Sized>(&mut self, _: &'static str, value: &T) -> Checked {
        value.serialize(*self)
    }
    fn end(self) -> Checked { Ok(()) }
}
