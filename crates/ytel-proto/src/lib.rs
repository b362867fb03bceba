// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire schema for ytel (Subscribe / Get / Set messages and typed values).
//!
//! These are plain serde types mirroring the telemetry protocol. A transport
//! implementation maps them onto its RPC stack; the client only ever sees
//! these shapes.
#![forbid(unsafe_code)]

mod status;
mod value;

use serde::{Deserialize, Serialize};

pub use status::{Code, Status};
pub use value::{AnyValue, TypedValue};
pub use ytel_path::{Path, PathElem, PathError, WILDCARD};

/// Payload encoding requested from (or sent to) the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Encoding {
    /// Plain JSON.
    Json,
    /// RFC 7951 JSON with module-qualified names.
    #[default]
    JsonIetf,
    /// Native typed scalars.
    Proto,
    /// Free-form text.
    Ascii,
    /// Opaque bytes.
    Bytes,
}

/// How the target should stream a subscribed path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionMode {
    /// Target picks the best mode per leaf.
    #[default]
    TargetDefined,
    /// Send only when a value changes.
    OnChange,
    /// Send periodically at the sample interval.
    Sample,
}

/// Lifetime of a subscription list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionListMode {
    /// Long-lived stream of updates.
    #[default]
    Stream,
    /// Single snapshot, then the target closes the stream.
    Once,
    /// Snapshot on each client poll.
    Poll,
}

/// Which part of the data tree a Get should return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    /// Everything.
    #[default]
    All,
    /// Configuration (read-write) data.
    Config,
    /// Derived state (read-only) data.
    State,
    /// Operational subset of state.
    Operational,
}

/// One path/value pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Path relative to the enclosing notification prefix.
    pub path: Path,
    /// Value; `None` is a protocol violation surfaced to the client.
    pub val: Option<TypedValue>,
}

impl Update {
    /// Update carrying a value.
    pub fn new(path: Path, val: impl Into<TypedValue>) -> Self {
        Self {
            path,
            val: Some(val.into()),
        }
    }
}

/// A timestamped batch of updates and deletes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Nanoseconds since the Unix epoch.
    pub timestamp: i64,
    /// Prepended to every update and delete path.
    pub prefix: Option<Path>,
    /// Updated paths.
    pub update: Vec<Update>,
    /// Deleted paths.
    pub delete: Vec<Path>,
    /// All updates form one indivisible group replacing the prefix subtree.
    pub atomic: bool,
}

impl Notification {
    /// Empty notification at `timestamp`.
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            ..Self::default()
        }
    }

    /// Set the prefix.
    pub fn with_prefix(mut self, prefix: Path) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// Append an update.
    pub fn with_update(mut self, path: Path, val: impl Into<TypedValue>) -> Self {
        self.update.push(Update::new(path, val));
        self
    }

    /// Append a raw update, which may lack a value.
    pub fn with_raw_update(mut self, update: Update) -> Self {
        self.update.push(update);
        self
    }

    /// Append a delete.
    pub fn with_delete(mut self, path: Path) -> Self {
        self.delete.push(path);
        self
    }

    /// Mark the notification atomic.
    pub fn atomic(mut self) -> Self {
        self.atomic = true;
        self
    }
}

/// One subscribed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Path to stream.
    pub path: Path,
    /// Streaming mode.
    pub mode: SubscriptionMode,
    /// Sample interval in nanoseconds; zero lets the target choose.
    pub sample_interval: u64,
}

/// Subscribe RPC request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// Target device name, if the transport multiplexes targets.
    pub target: Option<String>,
    /// Prefix shared by all subscriptions.
    pub prefix: Path,
    /// Subscribed paths.
    pub subscription: Vec<Subscription>,
    /// Stream lifetime.
    pub mode: SubscriptionListMode,
    /// Requested payload encoding.
    pub encoding: Encoding,
}

/// One message on a subscribe stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SubscribeResponse {
    /// Data.
    Update(Notification),
    /// All data present at subscription time has been sent.
    SyncResponse,
}

/// Get RPC request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRequest {
    /// Target device name.
    pub target: Option<String>,
    /// Prefix shared by all paths.
    pub prefix: Path,
    /// Requested paths.
    pub path: Vec<Path>,
    /// Config, state or both.
    pub data_type: DataType,
    /// Requested payload encoding.
    pub encoding: Encoding,
}

/// Get RPC response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetResponse {
    /// Returned data.
    pub notification: Vec<Notification>,
}

/// Kind of an individual set operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SetOp {
    /// Path deleted.
    Delete,
    /// Subtree replaced.
    Replace,
    /// Subtree merged.
    Update,
    /// Subtree replaced across schema origins.
    UnionReplace,
}

/// Per-operation acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResult {
    /// Path the operation addressed.
    pub path: Path,
    /// Operation kind.
    pub op: SetOp,
}

/// Set RPC request. Deletes are applied first, then replaces, then updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetRequest {
    /// Target device name.
    pub target: Option<String>,
    /// Prefix shared by all operations.
    pub prefix: Path,
    /// Paths to delete.
    pub delete: Vec<Path>,
    /// Subtrees to replace.
    pub replace: Vec<Update>,
    /// Subtrees to merge.
    pub update: Vec<Update>,
    /// Cross-origin replacements.
    pub union_replace: Vec<Update>,
}

impl SetRequest {
    /// Number of operations carried.
    pub fn op_count(&self) -> usize {
        self.delete.len() + self.replace.len() + self.update.len() + self.union_replace.len()
    }
}

/// Set RPC response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetResponse {
    /// Echoed prefix.
    pub prefix: Path,
    /// One result per operation.
    pub response: Vec<UpdateResult>,
    /// Commit timestamp, nanoseconds since the Unix epoch.
    pub timestamp: i64,
}

/// RPC name for a request, used in log fields.
pub trait RpcName {
    /// Short lowercase method name.
    fn rpc_name(&self) -> &'static str;
}

impl RpcName for SubscribeRequest {
    fn rpc_name(&self) -> &'static str {
        match self.mode {
            SubscriptionListMode::Stream => "subscribe",
            SubscriptionListMode::Once => "subscribe_once",
            SubscriptionListMode::Poll => "subscribe_poll",
        }
    }
}

impl RpcName for GetRequest {
    fn rpc_name(&self) -> &'static str {
        "get"
    }
}

impl RpcName for SetRequest {
    fn rpc_name(&self) -> &'static str {
        "set"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_builder_keeps_order() {
        let a: Path = "/a".parse().unwrap();
        let b: Path = "/b".parse().unwrap();
        let n = Notification::new(100)
            .with_update(a.clone(), "x")
            .with_update(b.clone(), 7_i64)
            .with_delete(a.clone())
            .atomic();
        assert_eq!(n.update[0].path, a);
        assert_eq!(n.update[1].val, Some(TypedValue::Int(7)));
        assert_eq!(n.delete, vec![a]);
        assert!(n.atomic);
    }

    #[test]
    fn json_payload_helpers() {
        let v = TypedValue::json_ietf(&serde_json::json!({"a": 1})).unwrap();
        assert_eq!(v.kind(), "json_ietf_val");
        let back = v.as_json().unwrap().unwrap();
        assert_eq!(back["a"], 1);
        assert!(TypedValue::Int(1).as_json().is_none());
    }

    #[test]
    fn status_display_carries_code_and_message() {
        let s = Status::not_found("no such path");
        assert_eq!(s.to_string(), "rpc error: code = NotFound desc = no such path");
    }

    #[test]
    fn rpc_names() {
        let req = SubscribeRequest {
            target: None,
            prefix: Path::root(),
            subscription: Vec::new(),
            mode: SubscriptionListMode::Once,
            encoding: Encoding::Proto,
        };
        assert_eq!(req.rpc_name(), "subscribe_once");
        assert_eq!(SetRequest::default().op_count(), 0);
    }
}
