// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error types for the client.

use thiserror::Error;
use ytel_proto::{Path, Status};

use crate::query::TranslateError;
use crate::schema::FieldError;

/// Hard decode failure for one query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// An update arrived without a value.
    #[error("invalid nil value in update at {path}")]
    NilValue {
        /// Absolute update path.
        path: Path,
    },
    /// Data that cannot describe a single leaf.
    #[error("noncompliant data encountered while unmarshalling leaf {path}: {detail}")]
    Noncompliant {
        /// Queried leaf.
        path: Path,
        /// What was wrong.
        detail: String,
    },
    /// The leaf value did not fit its schema type.
    #[error("failed to unmarshal leaf {path}: {source}")]
    Unmarshal {
        /// Queried leaf.
        path: Path,
        /// Decoder complaint.
        #[source]
        source: FieldError,
    },
}

/// Encoding a set request failed.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// JSON serialization failed.
    #[error("json encoding of {path} failed: {source}")]
    Json {
        /// Operation path.
        path: Path,
        /// Serializer error.
        #[source]
        source: serde_json::Error,
    },
    /// Schemaless payloads need a non-schema origin.
    #[error("schemaless value at {path} cannot be sent with origin {origin:?}")]
    UnsupportedOrigin {
        /// Operation path.
        path: Path,
        /// Origin of the path (empty when unset).
        origin: String,
    },
}

/// Caller misuse, detected before any request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    /// A watcher or reconciler was awaited twice.
    #[error("await already called and watcher is closed")]
    AwaitCalled,
    /// Translators only support single leaves.
    #[error("functional translators only support leaf queries")]
    TranslatorOnContainer,
    /// A batch path outside the batch root.
    #[error("root path {root} is not a prefix of {path}")]
    NotAPrefix {
        /// Batch or reconciler root.
        root: Path,
        /// Rejected path.
        path: Path,
    },
    /// Mutations need a config query.
    #[error("set operations require a config query, got state path {path}")]
    StateQuery {
        /// Rejected path.
        path: Path,
    },
    /// Reconcilers pair a config container with a state container.
    #[error("reconciler needs a config container and a state container: {reason}")]
    ReconcilerShape {
        /// What was wrong.
        reason: &'static str,
    },
}

/// Umbrella error for client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The subscribe call itself failed.
    #[error("failed to subscribe: {0}")]
    Subscribe(#[source] Status),
    /// The stream failed mid-flight.
    #[error("error receiving response: {0}")]
    Receive(#[source] Status),
    /// The target closed the stream.
    #[error("error receiving response: end of stream")]
    EndOfStream,
    /// A notification could not be accepted.
    #[error("failed to receive to data: {0}")]
    Ingest(#[source] DecodeError),
    /// The queried leaf could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// `get`/`get_all` found nothing.
    #[error("value not present")]
    NotPresent,
    /// The context was cancelled.
    #[error("context canceled")]
    Cancelled,
    /// The context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
    /// The Get RPC failed.
    #[error("get request failed: {0}")]
    Get(#[source] Status),
    /// The Set RPC failed.
    #[error("set request failed: {0}")]
    Set(#[source] Status),
    /// The set request could not be encoded.
    #[error("failed to encode set request: {0}")]
    Encode(#[source] EncodeError),
    /// A translator could not map the query path.
    #[error(transparent)]
    Translate(#[from] TranslateError),
    /// The caller's predicate or callback failed.
    #[error("predicate failed: {0}")]
    Predicate(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    /// API misuse.
    #[error(transparent)]
    Usage(#[from] UsageError),
    /// The background task died.
    #[error("watch task failed: {0}")]
    Task(String),
}

impl ClientError {
    /// True for cancellation and deadline expiry.
    pub fn is_context(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// Transport status carried by this error, if any.
    pub fn status(&self) -> Option<&Status> {
        match self {
            Self::Subscribe(s) | Self::Receive(s) | Self::Get(s) | Self::Set(s) => Some(s),
            _ => None,
        }
    }
}
