// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Capability traits implemented by generated schema types.
//!
//! The client never inspects concrete schema structs. It hands every
//! accumulated `(relative path, wire value)` pair to [`Typed::decode_field`]
//! and asks [`Typed::encode_json`] / [`Typed::encode_native`] for the wire
//! form when building set requests.

use thiserror::Error;
use ytel_proto::{DataType, Path, PathElem, TypedValue};

/// Which half of a container a query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// Derived (read-only) state leaves.
    State,
    /// Intended configuration leaves.
    Config,
}

impl View {
    /// Get request data type matching this view.
    pub fn data_type(self) -> DataType {
        match self {
            Self::State => DataType::State,
            Self::Config => DataType::Config,
        }
    }

    /// Conventional container name holding this view's leaves.
    pub fn segment(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Config => "config",
        }
    }
}

/// Result of offering one field to a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOutcome {
    /// The field was stored.
    Applied,
    /// The field belongs to the other view and was skipped.
    Ignored,
}

/// Why a field could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// No schema field lives at this path.
    #[error("no schema field at {path}")]
    UnknownPath {
        /// Offending path, relative to the decoded value.
        path: Path,
    },
    /// The wire variant cannot represent the schema type.
    #[error("failed to unmarshal {found} into {expected}")]
    WrongType {
        /// Schema type name.
        expected: &'static str,
        /// Wire variant name.
        found: &'static str,
    },
    /// The payload had the right variant but unusable content.
    #[error("failed to unmarshal {expected}: {reason}")]
    Malformed {
        /// Schema type name.
        expected: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

impl FieldError {
    /// Unknown-path error for a relative element slice.
    pub fn unknown(rel: &[PathElem]) -> Self {
        Self::UnknownPath {
            path: Path::from_elems(rel.iter().cloned()),
        }
    }

    /// True when this error classifies as a path error rather than a type error.
    pub fn is_path_error(&self) -> bool {
        matches!(self, Self::UnknownPath { .. })
    }
}

/// Knobs for JSON encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// RFC 7951 rules (64-bit integers as strings).
    pub ietf: bool,
    /// Qualify member names with their module (`module:name`).
    pub module_names: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            ietf: true,
            module_names: true,
        }
    }
}

impl EncodeOptions {
    /// Options for members below the top level, which are never qualified.
    pub fn nested(self) -> Self {
        Self {
            module_names: false,
            ..self
        }
    }

    /// Member name, qualified when requested.
    pub fn member(&self, module: &str, name: &str) -> String {
        if self.module_names && !module.is_empty() {
            format!("{module}:{name}")
        } else {
            name.to_owned()
        }
    }
}

/// Decode/encode capability of a schema type (container, list or leaf).
pub trait Typed: Clone + Default + Send + Sync + 'static {
    /// Apply one wire field addressed by `rel`, relative to this value.
    ///
    /// An empty `rel` addresses the value itself (a scalar leaf, or a JSON
    /// document for a container).
    fn decode_field(
        &mut self,
        rel: &[PathElem],
        value: &TypedValue,
        view: View,
    ) -> Result<FieldOutcome, FieldError>;

    /// Apply a parsed JSON document describing this whole value.
    fn decode_json(
        &mut self,
        _json: &serde_json::Value,
        _view: View,
    ) -> Result<FieldOutcome, FieldError> {
        Err(FieldError::WrongType {
            expected: std::any::type_name::<Self>(),
            found: "json",
        })
    }

    /// JSON form of this value.
    fn encode_json(&self, opts: &EncodeOptions) -> serde_json::Value;

    /// Native wire scalar, when this is a leaf.
    fn encode_native(&self) -> Option<TypedValue> {
        None
    }
}

/// Parse the JSON payload of a wire value.
pub fn parse_json(value: &TypedValue, expected: &'static str) -> Result<serde_json::Value, FieldError> {
    match value.as_json() {
        Some(Ok(doc)) => Ok(doc),
        Some(Err(e)) => Err(FieldError::Malformed {
            expected,
            reason: e.to_string(),
        }),
        None => Err(FieldError::WrongType {
            expected,
            found: value.kind(),
        }),
    }
}

/// Look up a JSON member by bare or module-qualified name.
pub fn json_member<'a>(
    obj: &'a serde_json::Map<String, serde_json::Value>,
    name: &str,
) -> Option<&'a serde_json::Value> {
    obj.get(name).or_else(|| {
        obj.iter()
            .find(|(k, _)| k.rsplit_once(':').is_some_and(|(_, bare)| bare == name))
            .map(|(_, v)| v)
    })
}
