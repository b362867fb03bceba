// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Background watches: predicate-driven streams and collectors.
//!
//! Each watcher owns one tokio task reading one subscribe stream into a
//! private accumulator. The task stops when the predicate says so, the
//! stream ends or fails, or the watcher's context finishes. Dropping the
//! watcher cancels the task.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, info};
use ytel_proto::{Path, SubscriptionListMode};

use crate::accumulator::Accumulator;
use crate::client::Client;
use crate::context::Context;
use crate::error::{ClientError, UsageError};
use crate::query::{SingletonQuery, WildcardQuery};
use crate::schema::Typed;
use crate::session::{Event, Router, Session};
use crate::value::Value;

/// Predicate outcome for one evaluated value.
#[derive(Debug)]
pub enum Verdict {
    /// Keep streaming.
    Continue,
    /// Done; the watch succeeds with the current value.
    Stop,
    /// Abort the watch with an error.
    Fail(anyhow::Error),
}

impl Verdict {
    /// `Stop` when `done`, `Continue` otherwise.
    pub fn stop_if(done: bool) -> Self {
        if done {
            Self::Stop
        } else {
            Self::Continue
        }
    }
}

type Shared<V> = Arc<Mutex<V>>;

fn lock<V>(m: &Mutex<V>) -> std::sync::MutexGuard<'_, V> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A spawned task plus the context that cancels it. Joinable once.
#[derive(Debug)]
pub(crate) struct TaskHandle<R> {
    ctx: Context,
    join: Option<JoinHandle<R>>,
}

impl<R: Send + 'static> TaskHandle<R> {
    pub(crate) fn spawn<Fut>(ctx: Context, fut: Fut) -> Self
    where
        Fut: std::future::Future<Output = R> + Send + 'static,
    {
        Self {
            ctx,
            join: Some(tokio::spawn(fut)),
        }
    }

    pub(crate) async fn join(&mut self) -> Result<R, ClientError> {
        let handle = self.join.take().ok_or(UsageError::AwaitCalled)?;
        handle.await.map_err(|e| ClientError::Task(e.to_string()))
    }

    pub(crate) fn cancel(&self) {
        self.ctx.cancel();
    }
}

impl<R> Drop for TaskHandle<R> {
    fn drop(&mut self) {
        self.ctx.cancel();
    }
}

/// Handle on a running watch.
#[derive(Debug)]
pub struct Watcher<T> {
    task: TaskHandle<Result<Value<T>, ClientError>>,
    last: Shared<Option<Value<T>>>,
}

impl<T: Typed> Watcher<T> {
    /// Wait for the watch to finish.
    ///
    /// Returns the value that satisfied the predicate, or the error that
    /// ended the stream. A second call fails with
    /// [`UsageError::AwaitCalled`].
    pub async fn await_value(&mut self) -> Result<Value<T>, ClientError> {
        self.task.join().await?
    }

    /// Most recently evaluated value, if any.
    pub fn last_value(&self) -> Option<Value<T>> {
        lock(&self.last).clone()
    }

    /// Stop the watch; a pending [`await_value`](Self::await_value) resolves
    /// with [`ClientError::Cancelled`].
    pub fn cancel(&self) {
        self.task.cancel();
    }
}

pub(crate) fn judge(verdict: Verdict) -> Option<Result<(), ClientError>> {
    match verdict {
        Verdict::Continue => None,
        Verdict::Stop => Some(Ok(())),
        Verdict::Fail(err) => Some(Err(ClientError::Predicate(err.into()))),
    }
}

async fn drive_watch<T, F>(
    client: Client,
    ctx: Context,
    query: SingletonQuery<T>,
    mut pred: F,
    last: Shared<Option<Value<T>>>,
) -> Result<Value<T>, ClientError>
where
    T: Typed,
    F: FnMut(&Value<T>) -> Verdict + Send + 'static,
{
    let router = Router::for_query(query.spec(), client.options().validator.clone())?;
    let mut session = Session::open(&client, &ctx, router, SubscriptionListMode::Stream).await?;
    let mut acc = Accumulator::new();
    let mut evaluated = false;
    loop {
        let event = session.next(&mut acc).await?;
        let due = match event {
            Event::Notification => acc.changed_under(query.path()) || !acc.strays().is_empty(),
            Event::Sync => !evaluated,
            Event::End => return Err(ClientError::EndOfStream),
        };
        if due {
            evaluated = true;
            let value = query.decode(&acc)?;
            let verdict = pred(&value);
            *lock(&last) = Some(value.clone());
            if let Some(done) = judge(verdict) {
                info!(path = %query.path(), ok = done.is_ok(), "watch finished");
                return done.map(|()| value);
            }
        }
        if event == Event::Notification {
            acc.begin_cycle();
        }
    }
}

fn push_unique(out: &mut Vec<Path>, path: Path) {
    if !out.contains(&path) {
        out.push(path);
    }
}

async fn drive_watch_all<T, F>(
    client: Client,
    ctx: Context,
    query: WildcardQuery<T>,
    mut pred: F,
    last: Shared<Option<Value<T>>>,
) -> Result<Value<T>, ClientError>
where
    T: Typed,
    F: FnMut(&Value<T>) -> Verdict + Send + 'static,
{
    let router = Router::for_query(query.spec(), client.options().validator.clone())?;
    let mut session = Session::open(&client, &ctx, router, SubscriptionListMode::Stream).await?;
    let mut acc = Accumulator::new();
    let mut known: Vec<Path> = Vec::new();
    let mut evaluated = false;
    loop {
        let event = session.next(&mut acc).await?;
        let mut due = Vec::new();
        match event {
            Event::Notification => {
                for path in acc.matching(query.path()) {
                    push_unique(&mut known, path);
                }
                for changed in acc.changed_paths() {
                    for element in query.elements_for(changed, &known) {
                        push_unique(&mut due, element);
                    }
                }
            }
            Event::Sync if !evaluated => due = acc.matching(query.path()),
            Event::Sync => {}
            Event::End => return Err(ClientError::EndOfStream),
        }
        for path in due {
            evaluated = true;
            let value = query.decode_element(&acc, &path);
            if !value.is_present() {
                known.retain(|k| k != &path);
            }
            let verdict = pred(&value);
            *lock(&last) = Some(value.clone());
            if let Some(done) = judge(verdict) {
                info!(pattern = %query.path(), %path, ok = done.is_ok(), "watch finished");
                return done.map(|()| value);
            }
        }
        if event == Event::Notification {
            acc.begin_cycle();
        }
    }
}

pub(crate) fn spawn_watch<T, F>(client: &Client, ctx: &Context, query: SingletonQuery<T>, pred: F) -> Watcher<T>
where
    T: Typed,
    F: FnMut(&Value<T>) -> Verdict + Send + 'static,
{
    let ctx = ctx.child();
    let last = Arc::new(Mutex::new(None));
    debug!(path = %query.path(), "starting watch");
    let fut = drive_watch(client.clone(), ctx.clone(), query, pred, Arc::clone(&last));
    Watcher {
        task: TaskHandle::spawn(ctx, fut),
        last,
    }
}

pub(crate) fn spawn_watch_all<T, F>(client: &Client, ctx: &Context, query: WildcardQuery<T>, pred: F) -> Watcher<T>
where
    T: Typed,
    F: FnMut(&Value<T>) -> Verdict + Send + 'static,
{
    let ctx = ctx.child();
    let last = Arc::new(Mutex::new(None));
    debug!(pattern = %query.path(), "starting wildcard watch");
    let fut = drive_watch_all(client.clone(), ctx.clone(), query, pred, Arc::clone(&last));
    Watcher {
        task: TaskHandle::spawn(ctx, fut),
        last,
    }
}

/// Everything a collector saw, plus what stopped it.
#[derive(Debug)]
pub struct Collected<T> {
    /// Values in evaluation order.
    pub values: Vec<Value<T>>,
    /// Terminating error: usually [`ClientError::Cancelled`] or
    /// [`ClientError::DeadlineExceeded`].
    pub end: ClientError,
}

/// A watch that records every evaluated value until its context ends.
#[derive(Debug)]
pub struct Collector<T> {
    watcher: Watcher<T>,
    values: Shared<Vec<Value<T>>>,
}

impl<T: Typed> Collector<T> {
    pub(crate) fn single(client: &Client, ctx: &Context, query: SingletonQuery<T>) -> Self {
        let values: Shared<Vec<Value<T>>> = Arc::default();
        let sink = Arc::clone(&values);
        let watcher = spawn_watch(client, ctx, query, move |v: &Value<T>| {
            lock(&sink).push(v.clone());
            Verdict::Continue
        });
        Self { watcher, values }
    }

    pub(crate) fn wildcard(client: &Client, ctx: &Context, query: WildcardQuery<T>) -> Self {
        let values: Shared<Vec<Value<T>>> = Arc::default();
        let sink = Arc::clone(&values);
        let watcher = spawn_watch_all(client, ctx, query, move |v: &Value<T>| {
            lock(&sink).push(v.clone());
            Verdict::Continue
        });
        Self { watcher, values }
    }

    /// Wait for the stream to end and return everything collected.
    ///
    /// Only fails for misuse (a second call) or a panicked task; stream and
    /// context errors are reported in [`Collected::end`].
    pub async fn await_values(&mut self) -> Result<Collected<T>, ClientError> {
        let end = match self.watcher.task.join().await? {
            Ok(_) => ClientError::EndOfStream,
            Err(err) => err,
        };
        let values = std::mem::take(&mut *lock(&self.values));
        Ok(Collected { values, end })
    }

    /// Stop collecting.
    pub fn cancel(&self) {
        self.watcher.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_if_maps_bools() {
        assert!(matches!(Verdict::stop_if(true), Verdict::Stop));
        assert!(matches!(Verdict::stop_if(false), Verdict::Continue));
    }

    #[test]
    fn failing_verdict_carries_the_cause() {
        let done = judge(Verdict::Fail(anyhow::anyhow!("boom"))).unwrap();
        let err = done.unwrap_err();
        assert_eq!(err.to_string(), "predicate failed: boom");
    }

    #[tokio::test]
    async fn task_handle_joins_once() {
        let mut handle = TaskHandle::spawn(Context::new(), async { 7 });
        assert_eq!(handle.join().await.unwrap(), 7);
        let err = handle.join().await.unwrap_err();
        assert_eq!(err.to_string(), "await already called and watcher is closed");
    }
}
