// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Leaf scalar bindings: strings, integers, booleans, floats and leaf-lists.

use std::any::type_name;

use serde_json::Value as Json;
use ytel_proto::TypedValue;

use crate::schema::{parse_json, FieldError, Typed};

/// A leaf type with a single wire representation.
///
/// Implement this for generated enumerations and use [`typed_scalar!`] to
/// derive the matching [`Typed`] implementation.
///
/// [`typed_scalar!`]: crate::typed_scalar
pub trait Scalar: Sized {
    /// Decode from a wire value.
    fn from_typed(value: &TypedValue) -> Result<Self, FieldError>;
    /// Decode from a JSON member.
    fn from_json(json: &Json) -> Result<Self, FieldError>;
    /// Native wire form.
    fn to_typed(&self) -> TypedValue;
    /// JSON form (`ietf` quotes 64-bit integers).
    fn to_json(&self, ietf: bool) -> Json;
}

/// Implement [`Typed`](crate::Typed) for a type that implements
/// [`Scalar`](crate::Scalar).
#[macro_export]
macro_rules! typed_scalar {
    ($($t:ty),+ $(,)?) => {$(
        impl $crate::Typed for $t {
            fn decode_field(
                &mut self,
                rel: &[$crate::PathElem],
                value: &$crate::TypedValue,
                _view: $crate::View,
            ) -> ::std::result::Result<$crate::FieldOutcome, $crate::FieldError> {
                if !rel.is_empty() {
                    return Err($crate::FieldError::unknown(rel));
                }
                *self = <$t as $crate::Scalar>::from_typed(value)?;
                Ok($crate::FieldOutcome::Applied)
            }

            fn decode_json(
                &mut self,
                json: &$crate::serde_json::Value,
                _view: $crate::View,
            ) -> ::std::result::Result<$crate::FieldOutcome, $crate::FieldError> {
                *self = <$t as $crate::Scalar>::from_json(json)?;
                Ok($crate::FieldOutcome::Applied)
            }

            fn encode_json(&self, opts: &$crate::EncodeOptions) -> $crate::serde_json::Value {
                <$t as $crate::Scalar>::to_json(self, opts.ietf)
            }

            fn encode_native(&self) -> Option<$crate::TypedValue> {
                Some(<$t as $crate::Scalar>::to_typed(self))
            }
        }
    )+};
}

fn wrong<T>(found: &'static str) -> FieldError {
    FieldError::WrongType {
        expected: type_name::<T>(),
        found,
    }
}

fn malformed<T>(reason: impl Into<String>) -> FieldError {
    FieldError::Malformed {
        expected: type_name::<T>(),
        reason: reason.into(),
    }
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "json null",
        Json::Bool(_) => "json bool",
        Json::Number(_) => "json number",
        Json::String(_) => "json string",
        Json::Array(_) => "json array",
        Json::Object(_) => "json object",
    }
}

/// Decode a JSON-carrying wire value through `from_json`.
fn via_json<T: Scalar>(value: &TypedValue) -> Result<T, FieldError> {
    T::from_json(&parse_json(value, type_name::<T>())?)
}

impl Scalar for String {
    fn from_typed(value: &TypedValue) -> Result<Self, FieldError> {
        match value {
            TypedValue::String(s) | TypedValue::Ascii(s) => Ok(s.clone()),
            TypedValue::JsonIetf(_) | TypedValue::Json(_) => via_json(value),
            other => Err(wrong::<Self>(other.kind())),
        }
    }

    fn from_json(json: &Json) -> Result<Self, FieldError> {
        json.as_str()
            .map(str::to_owned)
            .ok_or_else(|| wrong::<Self>(json_kind(json)))
    }

    fn to_typed(&self) -> TypedValue {
        TypedValue::String(self.clone())
    }

    fn to_json(&self, _ietf: bool) -> Json {
        Json::String(self.clone())
    }
}

impl Scalar for bool {
    fn from_typed(value: &TypedValue) -> Result<Self, FieldError> {
        match value {
            TypedValue::Bool(b) => Ok(*b),
            TypedValue::JsonIetf(_) | TypedValue::Json(_) => via_json(value),
            other => Err(wrong::<Self>(other.kind())),
        }
    }

    fn from_json(json: &Json) -> Result<Self, FieldError> {
        json.as_bool().ok_or_else(|| wrong::<Self>(json_kind(json)))
    }

    fn to_typed(&self) -> TypedValue {
        TypedValue::Bool(*self)
    }

    fn to_json(&self, _ietf: bool) -> Json {
        Json::Bool(*self)
    }
}

macro_rules! int_scalar {
    ($($t:ty => $variant:ident as $wide:ty, quoted: $quoted:expr);+ $(;)?) => {$(
        impl Scalar for $t {
            fn from_typed(value: &TypedValue) -> Result<Self, FieldError> {
                match value {
                    TypedValue::Int(i) => <$t>::try_from(*i).map_err(|e| malformed::<Self>(e.to_string())),
                    TypedValue::Uint(u) => <$t>::try_from(*u).map_err(|e| malformed::<Self>(e.to_string())),
                    TypedValue::JsonIetf(_) | TypedValue::Json(_) => via_json(value),
                    other => Err(wrong::<Self>(other.kind())),
                }
            }

            fn from_json(json: &Json) -> Result<Self, FieldError> {
                match json {
                    Json::Number(n) => n
                        .as_i64()
                        .map(i128::from)
                        .or_else(|| n.as_u64().map(i128::from))
                        .ok_or_else(|| malformed::<Self>(format!("{n} is not an integer")))
                        .and_then(|wide| <$t>::try_from(wide).map_err(|e| malformed::<Self>(e.to_string()))),
                    Json::String(s) => s.parse::<$t>().map_err(|e| malformed::<Self>(e.to_string())),
                    other => Err(wrong::<Self>(json_kind(other))),
                }
            }

            fn to_typed(&self) -> TypedValue {
                TypedValue::$variant(<$wide>::from(*self))
            }

            fn to_json(&self, ietf: bool) -> Json {
                if ietf && $quoted {
                    Json::String(self.to_string())
                } else {
                    Json::from(*self)
                }
            }
        }
        typed_scalar!($t);
    )+};
}

int_scalar! {
    i8 => Int as i64, quoted: false;
    i16 => Int as i64, quoted: false;
    i32 => Int as i64, quoted: false;
    i64 => Int as i64, quoted: true;
    u8 => Uint as u64, quoted: false;
    u16 => Uint as u64, quoted: false;
    u32 => Uint as u64, quoted: false;
    u64 => Uint as u64, quoted: true;
}

fn float_from_json<T>(json: &Json) -> Result<f64, FieldError> {
    match json {
        Json::Number(n) => n
            .as_f64()
            .ok_or_else(|| malformed::<T>(format!("{n} is not a float"))),
        Json::String(s) => s.parse::<f64>().map_err(|e| malformed::<T>(e.to_string())),
        other => Err(wrong::<T>(json_kind(other))),
    }
}

impl Scalar for f32 {
    /// `float32` leaves also arrive as 4 big-endian IEEE-754 bytes.
    fn from_typed(value: &TypedValue) -> Result<Self, FieldError> {
        match value {
            TypedValue::Float(f) => Ok(*f),
            #[allow(clippy::cast_possible_truncation)]
            TypedValue::Double(d) => Ok(*d as f32),
            TypedValue::Bytes(b) => <[u8; 4]>::try_from(b.as_slice())
                .map(f32::from_be_bytes)
                .map_err(|_| malformed::<Self>(format!("expected 4 bytes, got {}", b.len()))),
            TypedValue::JsonIetf(_) | TypedValue::Json(_) => via_json(value),
            other => Err(wrong::<Self>(other.kind())),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_json(json: &Json) -> Result<Self, FieldError> {
        float_from_json::<Self>(json).map(|f| f as f32)
    }

    fn to_typed(&self) -> TypedValue {
        TypedValue::Float(*self)
    }

    fn to_json(&self, _ietf: bool) -> Json {
        Json::from(f64::from(*self))
    }
}

impl Scalar for f64 {
    fn from_typed(value: &TypedValue) -> Result<Self, FieldError> {
        match value {
            TypedValue::Double(d) => Ok(*d),
            TypedValue::Float(f) => Ok(f64::from(*f)),
            TypedValue::Bytes(b) => <[u8; 8]>::try_from(b.as_slice())
                .map(f64::from_be_bytes)
                .map_err(|_| malformed::<Self>(format!("expected 8 bytes, got {}", b.len()))),
            TypedValue::JsonIetf(_) | TypedValue::Json(_) => via_json(value),
            other => Err(wrong::<Self>(other.kind())),
        }
    }

    fn from_json(json: &Json) -> Result<Self, FieldError> {
        float_from_json::<Self>(json)
    }

    fn to_typed(&self) -> TypedValue {
        TypedValue::Double(*self)
    }

    fn to_json(&self, _ietf: bool) -> Json {
        Json::from(*self)
    }
}

typed_scalar!(String, bool, f32, f64);

/// Leaf-lists.
impl<T: Scalar> Scalar for Vec<T> {
    fn from_typed(value: &TypedValue) -> Result<Self, FieldError> {
        match value {
            TypedValue::LeafList(items) => items.iter().map(T::from_typed).collect(),
            TypedValue::JsonIetf(_) | TypedValue::Json(_) => via_json(value),
            other => Err(wrong::<Self>(other.kind())),
        }
    }

    fn from_json(json: &Json) -> Result<Self, FieldError> {
        json.as_array()
            .ok_or_else(|| wrong::<Self>(json_kind(json)))?
            .iter()
            .map(T::from_json)
            .collect()
    }

    fn to_typed(&self) -> TypedValue {
        TypedValue::LeafList(self.iter().map(T::to_typed).collect())
    }

    fn to_json(&self, ietf: bool) -> Json {
        Json::Array(self.iter().map(|v| v.to_json(ietf)).collect())
    }
}

impl<T: Scalar + Clone + Send + Sync + 'static> Typed for Vec<T> {
    fn decode_field(
        &mut self,
        rel: &[ytel_proto::PathElem],
        value: &TypedValue,
        _view: crate::View,
    ) -> Result<crate::FieldOutcome, FieldError> {
        if !rel.is_empty() {
            return Err(FieldError::unknown(rel));
        }
        *self = <Self as Scalar>::from_typed(value)?;
        Ok(crate::FieldOutcome::Applied)
    }

    fn decode_json(&mut self, json: &Json, _view: crate::View) -> Result<crate::FieldOutcome, FieldError> {
        *self = <Self as Scalar>::from_json(json)?;
        Ok(crate::FieldOutcome::Applied)
    }

    fn encode_json(&self, opts: &crate::EncodeOptions) -> Json {
        Scalar::to_json(self, opts.ietf)
    }

    fn encode_native(&self) -> Option<TypedValue> {
        Some(Scalar::to_typed(self))
    }
}
