// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire-typed scalar and structured values.

use serde::{Deserialize, Serialize};

/// A protobuf `Any`: type URL plus opaque encoded message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnyValue {
    /// Fully-qualified type URL, e.g. `type.googleapis.com/pkg.Msg`.
    pub type_url: String,
    /// Encoded message bytes.
    pub value: Vec<u8>,
}

/// Value carried by an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypedValue {
    /// UTF-8 string.
    String(String),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    Uint(u64),
    /// Boolean.
    Bool(bool),
    /// Opaque bytes (also used for IEEE-754 `float32` leaves).
    Bytes(Vec<u8>),
    /// Single-precision float.
    Float(f32),
    /// Double-precision float.
    Double(f64),
    /// Homogeneous leaf-list.
    LeafList(Vec<TypedValue>),
    /// RFC 7951 JSON document.
    JsonIetf(Vec<u8>),
    /// Plain JSON document.
    Json(Vec<u8>),
    /// Free-form text, e.g. CLI configuration.
    Ascii(String),
    /// Embedded protobuf message.
    Any(AnyValue),
}

impl TypedValue {
    /// Short name of the wire variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::String(_) => "string_val",
            Self::Int(_) => "int_val",
            Self::Uint(_) => "uint_val",
            Self::Bool(_) => "bool_val",
            Self::Bytes(_) => "bytes_val",
            Self::Float(_) => "float_val",
            Self::Double(_) => "double_val",
            Self::LeafList(_) => "leaflist_val",
            Self::JsonIetf(_) => "json_ietf_val",
            Self::Json(_) => "json_val",
            Self::Ascii(_) => "ascii_val",
            Self::Any(_) => "any_val",
        }
    }

    /// Encode a JSON document as a JSON-IETF value.
    pub fn json_ietf(doc: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::to_vec(doc).map(Self::JsonIetf)
    }

    /// Encode a JSON document as a plain JSON value.
    pub fn json(doc: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::to_vec(doc).map(Self::Json)
    }

    /// Parse the payload of a JSON or JSON-IETF value.
    ///
    /// Returns `None` for every other variant.
    pub fn as_json(&self) -> Option<Result<serde_json::Value, serde_json::Error>> {
        match self {
            Self::JsonIetf(b) | Self::Json(b) => Some(serde_json::from_slice(b)),
            _ => None,
        }
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for TypedValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for TypedValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for TypedValue {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

impl From<bool> for TypedValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for TypedValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}
