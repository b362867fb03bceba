// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Config/state reconciliation over one subscription.

use std::fmt;

use tracing::{debug, info};
use ytel_proto::{Path, SubscriptionListMode};

use crate::accumulator::Accumulator;
use crate::client::Client;
use crate::context::Context;
use crate::error::{ClientError, UsageError};
use crate::query::SingletonQuery;
use crate::schema::{Typed, View};
use crate::session::{Event, Router, Session};
use crate::value::Value;
use crate::watch::{judge, TaskHandle, Verdict};

type Callback<C, S> = Box<dyn FnMut(&Value<C>, &Value<S>) -> Verdict + Send>;

trait Pair: Send {
    fn changed(&self, acc: &Accumulator) -> bool;
    fn fire(&mut self, acc: &Accumulator) -> Result<Verdict, ClientError>;
}

struct Bound<C, S> {
    config: SingletonQuery<C>,
    state: SingletonQuery<S>,
    callback: Callback<C, S>,
}

impl<C: Typed, S: Typed> Pair for Bound<C, S> {
    fn changed(&self, acc: &Accumulator) -> bool {
        acc.changed_under(self.config.path()) || acc.changed_under(self.state.path())
    }

    fn fire(&mut self, acc: &Accumulator) -> Result<Verdict, ClientError> {
        let config = self.config.decode(acc)?;
        let state = self.state.decode(acc)?;
        Ok((self.callback)(&config, &state))
    }
}

fn check_container<T: Typed>(query: &SingletonQuery<T>, view: View) -> Result<(), UsageError> {
    if query.is_leaf() {
        return Err(UsageError::ReconcilerShape {
            reason: "roots must be containers",
        });
    }
    if query.view() != view {
        return Err(UsageError::ReconcilerShape {
            reason: match view {
                View::Config => "first root must be a config query",
                View::State => "second root must be a state query",
            },
        });
    }
    Ok(())
}

fn check_under(root: &Path, path: &Path) -> Result<(), UsageError> {
    if root.is_prefix_of(path) {
        Ok(())
    } else {
        Err(UsageError::NotAPrefix {
            root: root.clone(),
            path: path.clone(),
        })
    }
}

/// Pairs the config and state views of one container.
///
/// The root callback runs whenever a notification changes either view.
/// Sub-reconcilers bind narrower (config, state) pairs and run only when
/// their own pair changed.
pub struct Reconciler<C, S> {
    client: Client,
    config: SingletonQuery<C>,
    state: SingletonQuery<S>,
    subs: Vec<Box<dyn Pair>>,
}

impl<C, S> fmt::Debug for Reconciler<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("subs", &self.subs.len())
            .finish_non_exhaustive()
    }
}

impl<C: Typed, S: Typed> Reconciler<C, S> {
    /// Reconcile `config` (a config container) against `state` (a state container).
    pub fn new(client: &Client, config: SingletonQuery<C>, state: SingletonQuery<S>) -> Result<Self, UsageError> {
        check_container(&config, View::Config)?;
        check_container(&state, View::State)?;
        Ok(Self {
            client: client.clone(),
            config,
            state,
            subs: Vec::new(),
        })
    }

    /// Bind a callback to a (config, state) pair below the roots.
    pub fn add_sub_reconciler<C2: Typed, S2: Typed>(
        &mut self,
        config: SingletonQuery<C2>,
        state: SingletonQuery<S2>,
        callback: impl FnMut(&Value<C2>, &Value<S2>) -> Verdict + Send + 'static,
    ) -> Result<&mut Self, UsageError> {
        check_under(self.config.path(), config.path())?;
        check_under(self.state.path(), state.path())?;
        self.subs.push(Box::new(Bound {
            config,
            state,
            callback: Box::new(callback),
        }));
        Ok(self)
    }

    /// Subscribe and start calling back in the background.
    pub fn start(
        self,
        ctx: &Context,
        callback: impl FnMut(&Value<C>, &Value<S>) -> Verdict + Send + 'static,
    ) -> ReconcileHandle {
        let ctx = ctx.child();
        let root = Bound {
            config: self.config.clone(),
            state: self.state.clone(),
            callback: Box::new(callback),
        };
        let fut = run(self.client, ctx.clone(), root, self.subs);
        ReconcileHandle {
            task: TaskHandle::spawn(ctx, fut),
        }
    }
}

async fn run<C: Typed, S: Typed>(
    client: Client,
    ctx: Context,
    mut root: Bound<C, S>,
    mut subs: Vec<Box<dyn Pair>>,
) -> Result<(), ClientError> {
    let mut paths = vec![root.config.path().clone()];
    if root.state.path() != root.config.path() {
        paths.push(root.state.path().clone());
    }
    let router = Router::for_paths(paths, client.options().validator.clone());
    let mut session = Session::open(&client, &ctx, router, SubscriptionListMode::Stream).await?;
    let mut acc = Accumulator::new();
    let mut evaluated = false;
    loop {
        let event = session.next(&mut acc).await?;
        let everything = match event {
            Event::Notification => false,
            Event::Sync if !evaluated => true,
            Event::Sync => continue,
            Event::End => return Err(ClientError::EndOfStream),
        };
        if everything || root.changed(&acc) {
            evaluated = true;
            debug!(config = %root.config.path(), "reconciling");
            if let Some(done) = judge(root.fire(&acc)?) {
                info!(ok = done.is_ok(), "reconciler finished");
                return done;
            }
            for sub in &mut subs {
                if everything || sub.changed(&acc) {
                    if let Some(done) = judge(sub.fire(&acc)?) {
                        info!(ok = done.is_ok(), "reconciler finished");
                        return done;
                    }
                }
            }
        }
        if event == Event::Notification {
            acc.begin_cycle();
        }
    }
}

/// Handle on a running reconciler.
#[derive(Debug)]
pub struct ReconcileHandle {
    task: TaskHandle<Result<(), ClientError>>,
}

impl ReconcileHandle {
    /// Wait for a callback to stop the reconciler or the stream to end.
    /// May be called once.
    pub async fn await_done(&mut self) -> Result<(), ClientError> {
        self.task.join().await?
    }

    /// Stop reconciling.
    pub fn cancel(&self) {
        self.task.cancel();
    }
}
