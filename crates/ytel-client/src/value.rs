// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reconstructed values and the compliance errors attached to them.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ytel_proto::{Path, TypedValue};

use crate::schema::FieldError;

/// Convert protocol nanoseconds to a wall-clock time (negative clamps to the epoch).
pub fn time_from_nanos(nanos: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_nanos(u64::try_from(nanos).unwrap_or(0))
}

/// One update the schema could not absorb.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryError {
    /// Absolute path of the update.
    pub path: Path,
    /// Offending wire value.
    pub value: Option<TypedValue>,
    /// Decoder complaint.
    pub err: FieldError,
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{} ({}): {}", self.path, v.kind(), self.err),
            None => write!(f, "{}: {}", self.path, self.err),
        }
    }
}

/// Non-fatal problems found while decoding a value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComplianceErrors {
    /// Updates at paths with no schema field.
    pub path_errors: Vec<TelemetryError>,
    /// Updates whose wire type did not fit the schema type.
    pub type_errors: Vec<TelemetryError>,
    /// Datapoints rejected by the caller's validator.
    pub validate_errors: Vec<String>,
}

impl ComplianceErrors {
    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.path_errors.is_empty() && self.type_errors.is_empty() && self.validate_errors.is_empty()
    }

    pub(crate) fn record(&mut self, path: Path, value: &TypedValue, err: FieldError) {
        let entry = TelemetryError {
            path,
            value: Some(value.clone()),
            err,
        };
        if entry.err.is_path_error() {
            self.path_errors.push(entry);
        } else {
            self.type_errors.push(entry);
        }
    }
}

impl fmt::Display for ComplianceErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sections = [
            ("Noncompliant paths", self.path_errors.iter().map(ToString::to_string).collect()),
            ("Type errors", self.type_errors.iter().map(ToString::to_string).collect()),
            ("Validation errors", self.validate_errors.clone()),
        ];
        let mut first = true;
        for (title, lines) in sections {
            let lines: Vec<String> = lines;
            if lines.is_empty() {
                continue;
            }
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "{title}:")?;
            for line in lines {
                write!(f, "\n\t{line}")?;
            }
        }
        Ok(())
    }
}

/// A reconstructed, possibly absent, typed value.
#[derive(Debug, Clone, PartialEq)]
pub struct Value<T> {
    /// Path that was queried (concrete, even for wildcard queries).
    pub path: Path,
    val: Option<T>,
    /// Latest notification or delete timestamp that touched the subtree.
    pub timestamp: Option<SystemTime>,
    /// Local time the latest contributing datapoint arrived.
    pub recv_timestamp: Option<SystemTime>,
    /// Problems found while decoding, if any.
    pub compliance_errors: Option<ComplianceErrors>,
}

impl<T> Value<T> {
    /// An absent value at `path`.
    pub fn absent(path: Path) -> Self {
        Self {
            path,
            val: None,
            timestamp: None,
            recv_timestamp: None,
            compliance_errors: None,
        }
    }

    /// A present value at `path`.
    pub fn present(path: Path, val: T) -> Self {
        Self {
            val: Some(val),
            ..Self::absent(path)
        }
    }

    /// Builder: set the notification timestamp from protocol nanoseconds.
    pub fn at(mut self, nanos: i64) -> Self {
        self.timestamp = Some(time_from_nanos(nanos));
        self
    }

    /// Payload, if present.
    pub fn val(&self) -> Option<&T> {
        self.val.as_ref()
    }

    /// Consume and return the payload.
    pub fn into_val(self) -> Option<T> {
        self.val
    }

    /// Whether a payload was reconstructed.
    pub fn is_present(&self) -> bool {
        self.val.is_some()
    }

    /// Replace the payload.
    pub fn set_val(&mut self, val: T) {
        self.val = Some(val);
    }

    /// Transform the payload, keeping metadata.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Value<U> {
        Value {
            path: self.path,
            val: self.val.map(f),
            timestamp: self.timestamp,
            recv_timestamp: self.recv_timestamp,
            compliance_errors: self.compliance_errors,
        }
    }
}

impl<T: fmt::Debug> fmt::Display for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.val {
            Some(v) => write!(f, "{}: {v:?}", self.path)?,
            None => write!(f, "{}: (absent)", self.path)?,
        }
        if let Some(errs) = &self.compliance_errors {
            write!(f, "\n{errs}")?;
        }
        Ok(())
    }
}
