// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! ytel-client: typed telemetry client.
//!
//! Streams of path-addressed notifications are folded into an
//! [`Accumulator`] and reconstructed into schema-typed [`Value`]s through
//! queries. On top of that sit one-shot lookups, predicate-driven watches,
//! collectors, config/state reconcilers and batched writes.
//!
//! Schema types implement [`Typed`]; scalar leaves come with the crate,
//! generated enumerations use [`typed_scalar!`], and keyed lists use
//! [`KeyedList`] / [`OrderedList`] over a [`ListEntry`].
#![forbid(unsafe_code)]

mod accumulator;
mod client;
pub mod config;
mod context;
mod error;
mod fetch;
mod list;
mod options;
mod query;
mod reconcile;
mod scalar;
mod schema;
mod session;
mod set;
mod transport;
mod value;
mod watch;

pub use accumulator::{Accumulator, Datapoint, Extracted};
pub use client::Client;
pub use config::{ClientConfig, ConfigError, ConfigService, ConfigStore};
pub use context::Context;
pub use error::{ClientError, DecodeError, EncodeError, UsageError};
pub use list::{KeyedList, ListEntry, ListKey, OrderedList};
pub use options::{Options, SetEncoding, Validator};
pub use query::{
    Batch, SingletonQuery, TranslateError, TranslatedPoint, Translator, WildcardBatch, WildcardQuery,
};
pub use reconcile::{ReconcileHandle, Reconciler};
pub use scalar::Scalar;
pub use schema::{json_member, parse_json, EncodeOptions, FieldError, FieldOutcome, Typed, View};
pub use session::SessionState;
pub use set::{Json, SchemalessValue, SetBatch, SetResult};
pub use transport::{SubscribeStream, Transport};
pub use value::{time_from_nanos, ComplianceErrors, TelemetryError, Value};
pub use watch::{Collected, Collector, Verdict, Watcher};

pub use serde_json;
pub use ytel_proto as proto;
pub use ytel_proto::{Path, PathElem, TypedValue};
