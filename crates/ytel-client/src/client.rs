// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The typed client: lookups, watches, collectors and writes.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::accumulator::Accumulator;
use crate::config::ClientConfig;
use crate::context::Context;
use crate::error::ClientError;
use crate::fetch::fetch;
use crate::options::Options;
use crate::query::{QuerySpec, SingletonQuery, WildcardQuery};
use crate::schema::Typed;
use crate::session::lookup_once;
use crate::set::{SetBatch, SetResult};
use crate::transport::Transport;
use crate::value::Value;
use crate::watch::{spawn_watch, spawn_watch_all, Collector, Verdict, Watcher};

/// Typed client over one [`Transport`]. Cheap to clone; clones share the
/// connection.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    target: Option<String>,
    options: Options,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("target", &self.target)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Client with default options.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            target: None,
            options: Options::default(),
        }
    }

    /// Client configured from a loaded [`ClientConfig`].
    pub fn from_config(transport: Arc<dyn Transport>, config: &ClientConfig) -> Self {
        Self {
            transport,
            target: config.target.clone(),
            options: config.options(),
        }
    }

    /// Same connection, addressing `target`.
    pub fn with_target(&self, target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..self.clone()
        }
    }

    /// Same connection with different call options.
    pub fn with_options(&self, options: Options) -> Self {
        Self {
            options,
            ..self.clone()
        }
    }

    /// Current options.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Target device name, if any.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    async fn snapshot(&self, ctx: &Context, spec: &QuerySpec) -> Result<Accumulator, ClientError> {
        if self.options.use_get {
            fetch(self, ctx, spec).await
        } else {
            lookup_once(self, ctx, spec).await
        }
    }

    /// Read the current value; absence is not an error.
    pub async fn lookup<T: Typed>(&self, ctx: &Context, query: &SingletonQuery<T>) -> Result<Value<T>, ClientError> {
        let acc = self.snapshot(ctx, query.spec()).await?;
        let value = query.decode(&acc)?;
        debug!(path = %query.path(), present = value.is_present(), "lookup");
        Ok(value)
    }

    /// Read the current payload, failing with [`ClientError::NotPresent`]
    /// when there is none.
    pub async fn get<T: Typed>(&self, ctx: &Context, query: &SingletonQuery<T>) -> Result<T, ClientError> {
        self.lookup(ctx, query).await?.into_val().ok_or(ClientError::NotPresent)
    }

    /// Read every present match of a wildcard query.
    pub async fn lookup_all<T: Typed>(
        &self,
        ctx: &Context,
        query: &WildcardQuery<T>,
    ) -> Result<Vec<Value<T>>, ClientError> {
        let acc = self.snapshot(ctx, query.spec()).await?;
        Ok(query.decode_all(&acc))
    }

    /// Payloads of every match, failing with [`ClientError::NotPresent`]
    /// when nothing matched.
    pub async fn get_all<T: Typed>(&self, ctx: &Context, query: &WildcardQuery<T>) -> Result<Vec<T>, ClientError> {
        let values: Vec<T> = self
            .lookup_all(ctx, query)
            .await?
            .into_iter()
            .filter_map(Value::into_val)
            .collect();
        if values.is_empty() {
            return Err(ClientError::NotPresent);
        }
        Ok(values)
    }

    /// Stream the query until `pred` stops or fails.
    pub fn watch<T, F>(&self, ctx: &Context, query: &SingletonQuery<T>, pred: F) -> Watcher<T>
    where
        T: Typed,
        F: FnMut(&Value<T>) -> Verdict + Send + 'static,
    {
        spawn_watch(self, ctx, query.clone(), pred)
    }

    /// Stream a wildcard query, evaluating `pred` once per changed element.
    pub fn watch_all<T, F>(&self, ctx: &Context, query: &WildcardQuery<T>, pred: F) -> Watcher<T>
    where
        T: Typed,
        F: FnMut(&Value<T>) -> Verdict + Send + 'static,
    {
        spawn_watch_all(self, ctx, query.clone(), pred)
    }

    /// Watch until the value equals `want`.
    pub async fn await_value<T>(
        &self,
        ctx: &Context,
        query: &SingletonQuery<T>,
        want: T,
    ) -> Result<Value<T>, ClientError>
    where
        T: Typed + PartialEq,
    {
        let mut watcher = self.watch(ctx, query, move |v: &Value<T>| {
            Verdict::stop_if(v.val() == Some(&want))
        });
        watcher.await_value().await
    }

    /// Record every value until the context ends.
    pub fn collect<T: Typed>(&self, ctx: &Context, query: &SingletonQuery<T>) -> Collector<T> {
        Collector::single(self, ctx, query.clone())
    }

    /// Record every element value of a wildcard query until the context ends.
    pub fn collect_all<T: Typed>(&self, ctx: &Context, query: &WildcardQuery<T>) -> Collector<T> {
        Collector::wildcard(self, ctx, query.clone())
    }

    /// Merge `value` at a config query.
    pub async fn update<T: Typed>(
        &self,
        ctx: &Context,
        query: &SingletonQuery<T>,
        value: T,
    ) -> Result<SetResult, ClientError> {
        let mut batch = SetBatch::new();
        batch.update(query, value)?;
        batch.set(self, ctx).await
    }

    /// Replace the subtree at a config query.
    pub async fn replace<T: Typed>(
        &self,
        ctx: &Context,
        query: &SingletonQuery<T>,
        value: T,
    ) -> Result<SetResult, ClientError> {
        let mut batch = SetBatch::new();
        batch.replace(query, value)?;
        batch.set(self, ctx).await
    }

    /// Delete the subtree at a config query.
    pub async fn delete<T: Typed>(&self, ctx: &Context, query: &SingletonQuery<T>) -> Result<SetResult, ClientError> {
        let mut batch = SetBatch::new();
        batch.delete(query)?;
        batch.set(self, ctx).await
    }
}
