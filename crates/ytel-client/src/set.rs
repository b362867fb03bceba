// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Batched mutations over the Set RPC.

use std::fmt;
use std::time::SystemTime;

use serde::Serialize;
use tracing::debug;
use ytel_proto::{AnyValue, Path, RpcName, SetOp, SetRequest, SetResponse, TypedValue, Update};

use crate::client::Client;
use crate::context::Context;
use crate::error::{ClientError, EncodeError, UsageError};
use crate::options::SetEncoding;
use crate::query::SingletonQuery;
use crate::schema::{EncodeOptions, Typed, View};
use crate::value::time_from_nanos;

/// Origin reserved for schema-described data.
const SCHEMA_ORIGIN: &str = "openconfig";

/// Outcome of a successful set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetResult {
    /// Acknowledgement as returned by the target.
    pub raw_response: SetResponse,
    /// Commit time reported by the target.
    pub timestamp: SystemTime,
}

/// Payload sent without a schema, under a non-schema origin.
pub trait SchemalessValue: Send + Sync + 'static {
    /// Wire encoding of this payload.
    fn to_typed(&self, path: &Path) -> Result<TypedValue, EncodeError>;
}

impl SchemalessValue for String {
    fn to_typed(&self, _path: &Path) -> Result<TypedValue, EncodeError> {
        Ok(TypedValue::Ascii(self.clone()))
    }
}

impl SchemalessValue for AnyValue {
    fn to_typed(&self, _path: &Path) -> Result<TypedValue, EncodeError> {
        Ok(TypedValue::Any(self.clone()))
    }
}

/// Any serialisable value, sent as plain JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T: Serialize + Send + Sync + 'static> SchemalessValue for Json<T> {
    fn to_typed(&self, path: &Path) -> Result<TypedValue, EncodeError> {
        serde_json::to_vec(&self.0)
            .map(TypedValue::Json)
            .map_err(|source| EncodeError::Json {
                path: path.clone(),
                source,
            })
    }
}

#[derive(Debug, Clone, Copy)]
struct Encoding {
    format: SetEncoding,
    module_names: bool,
}

trait Payload: Send + Sync {
    fn encode(&self, path: &Path, leaf: bool, enc: Encoding) -> Result<TypedValue, EncodeError>;
}

struct Schema<T>(T);

impl<T: Typed> Payload for Schema<T> {
    fn encode(&self, path: &Path, leaf: bool, enc: Encoding) -> Result<TypedValue, EncodeError> {
        if leaf && enc.format == SetEncoding::PreferProto {
            if let Some(native) = self.0.encode_native() {
                return Ok(native);
            }
        }
        let ietf = enc.format != SetEncoding::Json;
        let doc = self.0.encode_json(&EncodeOptions {
            ietf,
            module_names: enc.module_names,
        });
        let bytes = if leaf {
            serde_json::to_vec(&doc)
        } else {
            serde_json::to_vec_pretty(&doc)
        }
        .map_err(|source| EncodeError::Json {
            path: path.clone(),
            source,
        })?;
        Ok(if ietf {
            TypedValue::JsonIetf(bytes)
        } else {
            TypedValue::Json(bytes)
        })
    }
}

struct Schemaless<V>(V);

impl<V: SchemalessValue> Payload for Schemaless<V> {
    fn encode(&self, path: &Path, _leaf: bool, _enc: Encoding) -> Result<TypedValue, EncodeError> {
        match path.origin() {
            None | Some(SCHEMA_ORIGIN) => Err(EncodeError::UnsupportedOrigin {
                path: path.clone(),
                origin: path.origin().unwrap_or_default().to_owned(),
            }),
            Some(_) => self.0.to_typed(path),
        }
    }
}

struct Op {
    kind: SetOp,
    path: Path,
    leaf: bool,
    payload: Option<Box<dyn Payload>>,
}

/// A group of mutations applied by one Set request.
///
/// Operations keep their call order within each kind. The target applies
/// deletes, then replaces, then updates.
#[derive(Default)]
pub struct SetBatch {
    ops: Vec<Op>,
}

impl fmt::Debug for SetBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.ops.iter().map(|op| (op.kind, op.path.to_string())))
            .finish()
    }
}

fn config_path<T: Typed>(query: &SingletonQuery<T>) -> Result<Path, UsageError> {
    if query.view() == View::Config {
        Ok(query.path().clone())
    } else {
        Err(UsageError::StateQuery {
            path: query.path().clone(),
        })
    }
}

impl SetBatch {
    /// Empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn push_typed<T: Typed>(
        &mut self,
        kind: SetOp,
        query: &SingletonQuery<T>,
        value: T,
    ) -> Result<&mut Self, UsageError> {
        let path = config_path(query)?;
        self.ops.push(Op {
            kind,
            path,
            leaf: query.is_leaf(),
            payload: Some(Box::new(Schema(value))),
        });
        Ok(self)
    }

    fn push_schemaless<V: SchemalessValue>(&mut self, kind: SetOp, path: Path, value: V) -> &mut Self {
        self.ops.push(Op {
            kind,
            path,
            leaf: false,
            payload: Some(Box::new(Schemaless(value))),
        });
        self
    }

    /// Merge `value` into the config at the query path.
    pub fn update<T: Typed>(&mut self, query: &SingletonQuery<T>, value: T) -> Result<&mut Self, UsageError> {
        self.push_typed(SetOp::Update, query, value)
    }

    /// Replace the config subtree at the query path.
    pub fn replace<T: Typed>(&mut self, query: &SingletonQuery<T>, value: T) -> Result<&mut Self, UsageError> {
        self.push_typed(SetOp::Replace, query, value)
    }

    /// Replace across origins (schema and CLI config coexisting).
    pub fn union_replace<T: Typed>(
        &mut self,
        query: &SingletonQuery<T>,
        value: T,
    ) -> Result<&mut Self, UsageError> {
        self.push_typed(SetOp::UnionReplace, query, value)
    }

    /// Delete the config subtree at the query path.
    pub fn delete<T: Typed>(&mut self, query: &SingletonQuery<T>) -> Result<&mut Self, UsageError> {
        let path = config_path(query)?;
        self.ops.push(Op {
            kind: SetOp::Delete,
            path,
            leaf: query.is_leaf(),
            payload: None,
        });
        Ok(self)
    }

    /// Merge a schemaless payload. `path` must carry a non-schema origin.
    pub fn update_schemaless(&mut self, path: Path, value: impl SchemalessValue) -> &mut Self {
        self.push_schemaless(SetOp::Update, path, value)
    }

    /// Replace with a schemaless payload. `path` must carry a non-schema origin.
    pub fn replace_schemaless(&mut self, path: Path, value: impl SchemalessValue) -> &mut Self {
        self.push_schemaless(SetOp::Replace, path, value)
    }

    /// Union-replace with a schemaless payload.
    pub fn union_replace_schemaless(&mut self, path: Path, value: impl SchemalessValue) -> &mut Self {
        self.push_schemaless(SetOp::UnionReplace, path, value)
    }

    /// Delete a path outside the schema.
    pub fn delete_schemaless(&mut self, path: Path) -> &mut Self {
        self.ops.push(Op {
            kind: SetOp::Delete,
            path,
            leaf: false,
            payload: None,
        });
        self
    }

    /// Union-replace raw CLI text under origin `<namespace>_cli`.
    pub fn union_replace_cli(&mut self, namespace: &str, text: impl Into<String>) -> &mut Self {
        let path = Path::root().with_origin(format!("{namespace}_cli"));
        self.push_schemaless(SetOp::UnionReplace, path, text.into())
    }

    /// Encode the batch into a request for `target`.
    pub fn encode(
        &self,
        target: Option<&str>,
        encoding: SetEncoding,
        module_names: bool,
    ) -> Result<SetRequest, EncodeError> {
        let enc = Encoding {
            format: encoding,
            module_names,
        };
        let mut req = SetRequest {
            target: target.map(str::to_owned),
            ..SetRequest::default()
        };
        for op in &self.ops {
            let update = match &op.payload {
                Some(p) => Update {
                    path: op.path.clone(),
                    val: Some(p.encode(&op.path, op.leaf, enc)?),
                },
                None => {
                    req.delete.push(op.path.clone());
                    continue;
                }
            };
            match op.kind {
                SetOp::Replace => req.replace.push(update),
                SetOp::UnionReplace => req.union_replace.push(update),
                SetOp::Update | SetOp::Delete => req.update.push(update),
            }
        }
        Ok(req)
    }

    /// Send the batch.
    pub async fn set(&self, client: &Client, ctx: &Context) -> Result<SetResult, ClientError> {
        ctx.check()?;
        let opts = client.options();
        let request = self
            .encode(client.target(), opts.encoding, opts.module_names())
            .map_err(ClientError::Encode)?;
        debug!(rpc = request.rpc_name(), ops = request.op_count(), "sending set");
        let response = tokio::select! {
            err = ctx.done() => return Err(err),
            res = client.transport().set(request) => res.map_err(ClientError::Set)?,
        };
        Ok(SetResult {
            timestamp: time_from_nanos(response.timestamp),
            raw_response: response,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    #[test]
    fn state_queries_are_rejected() {
        let q = SingletonQuery::<String>::leaf(p("/a/state/x"), View::State);
        let err = SetBatch::new().update(&q, "v".into()).err().unwrap();
        assert!(matches!(err, UsageError::StateQuery { .. }));
    }

    #[test]
    fn leaf_is_compact_json_ietf() {
        let q = SingletonQuery::<i64>::leaf(p("/a/config/x"), View::Config);
        let mut batch = SetBatch::new();
        batch.replace(&q, 10).unwrap();
        let req = batch.encode(None, SetEncoding::JsonIetf, true).unwrap();
        assert_eq!(req.replace[0].val, Some(TypedValue::JsonIetf(b"\"10\"".to_vec())));
    }

    #[test]
    fn prefer_proto_uses_native_leaves() {
        let q = SingletonQuery::<String>::leaf(p("/a/config/x"), View::Config);
        let mut batch = SetBatch::new();
        batch.update(&q, "hi".into()).unwrap();
        let req = batch.encode(Some("dut"), SetEncoding::PreferProto, true).unwrap();
        assert_eq!(req.target.as_deref(), Some("dut"));
        assert_eq!(req.update[0].val, Some(TypedValue::String("hi".into())));
    }

    #[test]
    fn kinds_land_in_their_lists_in_call_order() {
        let a = SingletonQuery::<String>::leaf(p("/a/config/x"), View::Config);
        let b = SingletonQuery::<String>::leaf(p("/b/config/x"), View::Config);
        let mut batch = SetBatch::new();
        batch.update(&a, "1".into()).unwrap();
        batch.delete(&b).unwrap();
        batch.update(&b, "2".into()).unwrap();
        batch.union_replace_cli("eos", "hostname x");
        let req = batch.encode(None, SetEncoding::JsonIetf, true).unwrap();
        assert_eq!(req.delete, vec![p("/b/config/x")]);
        assert_eq!(req.update.len(), 2);
        assert_eq!(req.update[0].path, p("/a/config/x"));
        assert_eq!(req.union_replace[0].path.origin(), Some("eos_cli"));
        assert_eq!(req.union_replace[0].val, Some(TypedValue::Ascii("hostname x".into())));
    }

    #[test]
    fn schemaless_needs_foreign_origin() {
        let mut batch = SetBatch::new();
        batch.update_schemaless(p("/x").with_origin(SCHEMA_ORIGIN), Json(1));
        let err = batch.encode(None, SetEncoding::JsonIetf, true).unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedOrigin { .. }));

        let mut batch = SetBatch::new();
        batch.update_schemaless(p("/x").with_origin("vendor"), Json(vec![1, 2]));
        let req = batch.encode(None, SetEncoding::JsonIetf, true).unwrap();
        assert_eq!(req.update[0].val, Some(TypedValue::Json(b"[1,2]".to_vec())));
    }
}
