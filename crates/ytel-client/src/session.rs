// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Subscribe streams: request building, notification routing and the
//! session state machine shared by lookups, watches and reconcilers.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use futures_util::StreamExt;
use tracing::{debug, info, warn};
use ytel_proto::{
    Encoding, Notification, Path, RpcName, SubscribeRequest, SubscribeResponse, Subscription,
    SubscriptionListMode,
};

use crate::accumulator::{Accumulator, Admit, Datapoint, Resolved};
use crate::client::Client;
use crate::context::Context;
use crate::error::ClientError;
use crate::options::Validator;
use crate::query::{QuerySpec, Translator};
use crate::transport::SubscribeStream;

/// Lifecycle of one subscribe stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing sent yet.
    Init,
    /// Request sent, no response yet.
    Subscribing,
    /// Receiving the initial dump.
    Streaming,
    /// The initial dump is complete.
    Synced,
    /// The stream is over.
    Terminated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "init",
            Self::Subscribing => "subscribing",
            Self::Streaming => "streaming",
            Self::Synced => "synced",
            Self::Terminated => "terminated",
        })
    }
}

/// Decides where each incoming datapoint lands.
#[derive(Clone)]
pub(crate) struct Router {
    query_path: Path,
    subscribed: Vec<Path>,
    translator: Option<Arc<dyn Translator>>,
    validator: Option<Validator>,
}

impl Router {
    /// Router for one query; translated queries subscribe to the
    /// translator's input paths.
    pub(crate) fn for_query(spec: &QuerySpec, validator: Option<Validator>) -> Result<Self, ClientError> {
        let subscribed = match &spec.translator {
            Some(t) => t.input_paths(&spec.path)?,
            None => spec.subscribe.clone(),
        };
        Ok(Self {
            query_path: spec.path.clone(),
            subscribed,
            translator: spec.translator.clone(),
            validator,
        })
    }

    /// Router over several untranslated roots.
    pub(crate) fn for_paths(subscribed: Vec<Path>, validator: Option<Validator>) -> Self {
        Self {
            query_path: Path::root(),
            subscribed,
            translator: None,
            validator,
        }
    }

    pub(crate) fn subscribed(&self) -> &[Path] {
        &self.subscribed
    }

    fn in_scope(&self, path: &Path) -> bool {
        if self.translator.is_some() {
            return self.query_path.is_prefix_of(path);
        }
        self.subscribed.iter().any(|s| s.is_prefix_of(path))
    }

    fn validate(&self, dp: &Datapoint) -> Option<String> {
        let check = self.validator.as_ref()?;
        check(dp).err().map(|e| format!("{}: {e:#}", dp.path))
    }

    /// Map a resolved notification onto the query's output paths. The
    /// atomic clear is translated like a delete of its prefix and skipped
    /// when the translator cannot map it.
    fn translate(&self, resolved: &mut Resolved) {
        let Some(translator) = &self.translator else {
            return;
        };
        let mut updates = Vec::new();
        let mut deletes = Vec::new();
        let inputs = resolved
            .clear
            .take()
            .into_iter()
            .chain(resolved.deletes.drain(..))
            .map(|p| (p, None))
            .chain(resolved.updates.drain(..).map(|(p, v)| (p, Some(v))));
        for (path, value) in inputs {
            match translator.translate(&path, value.as_ref()) {
                Ok(points) => {
                    for point in points.into_iter().filter(|pt| pt.path.matches(&self.query_path)) {
                        match point.value {
                            Some(v) => updates.push((point.path, v)),
                            None => deletes.push(point.path),
                        }
                    }
                }
                Err(err) => warn!(%path, %err, "skipping untranslatable datapoint"),
            }
        }
        resolved.updates = updates;
        resolved.deletes = deletes;
    }

    /// Apply one notification to `acc` as a single unit.
    pub(crate) fn ingest(&self, acc: &mut Accumulator, n: &Notification) -> Result<(), ClientError> {
        let mut resolved = Resolved::from_notification(n, SystemTime::now()).map_err(ClientError::Ingest)?;
        self.translate(&mut resolved);
        acc.apply_resolved(resolved, |dp| {
            if self.in_scope(&dp.path) {
                Admit::Store(self.validate(dp))
            } else {
                debug!(path = %dp.path, "update outside subscribed paths");
                Admit::Stray
            }
        });
        Ok(())
    }
}

/// What the stream delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    /// A notification was applied.
    Notification,
    /// The initial dump finished.
    Sync,
    /// The target closed the stream.
    End,
}

/// One open subscribe stream.
pub(crate) struct Session {
    stream: SubscribeStream,
    ctx: Context,
    router: Router,
    state: SessionState,
}

impl Session {
    /// Send the subscribe request, racing the context.
    pub(crate) async fn open(
        client: &Client,
        ctx: &Context,
        router: Router,
        list_mode: SubscriptionListMode,
    ) -> Result<Self, ClientError> {
        ctx.check()?;
        let opts = client.options();
        let request = SubscribeRequest {
            target: client.target().map(str::to_owned),
            prefix: Path::root(),
            subscription: router
                .subscribed()
                .iter()
                .map(|path| Subscription {
                    path: path.clone(),
                    mode: opts.mode,
                    sample_interval: opts.sample_nanos(),
                })
                .collect(),
            mode: list_mode,
            encoding: Encoding::JsonIetf,
        };
        debug!(
            rpc = request.rpc_name(),
            paths = request.subscription.len(),
            state = %SessionState::Subscribing,
            "opening subscription"
        );
        let stream = tokio::select! {
            err = ctx.done() => return Err(err),
            res = client.transport().subscribe(request) => res.map_err(ClientError::Subscribe)?,
        };
        Ok(Self {
            stream,
            ctx: ctx.clone(),
            router,
            state: SessionState::Subscribing,
        })
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, to: SessionState) {
        if self.state != to {
            debug!(from = %self.state, %to, "session state");
            self.state = to;
        }
    }

    /// Read and apply the next message.
    pub(crate) async fn next(&mut self, acc: &mut Accumulator) -> Result<Event, ClientError> {
        let msg = tokio::select! {
            err = self.ctx.done() => {
                self.transition(SessionState::Terminated);
                return Err(err);
            }
            msg = self.stream.next() => msg,
        };
        match msg {
            Some(Ok(SubscribeResponse::Update(n))) => {
                if self.state == SessionState::Subscribing {
                    self.transition(SessionState::Streaming);
                }
                debug!(
                    timestamp = n.timestamp,
                    updates = n.update.len(),
                    deletes = n.delete.len(),
                    atomic = n.atomic,
                    "notification"
                );
                if let Err(err) = self.router.ingest(acc, &n) {
                    self.transition(SessionState::Terminated);
                    return Err(err);
                }
                Ok(Event::Notification)
            }
            Some(Ok(SubscribeResponse::SyncResponse)) => {
                self.transition(SessionState::Synced);
                Ok(Event::Sync)
            }
            Some(Err(status)) => {
                self.transition(SessionState::Terminated);
                Err(ClientError::Receive(status))
            }
            None => {
                self.transition(SessionState::Terminated);
                info!("subscription closed by target");
                Ok(Event::End)
            }
        }
    }
}

/// Run a once-subscription to its sync (or end) and return the accumulator.
pub(crate) async fn lookup_once(client: &Client, ctx: &Context, spec: &QuerySpec) -> Result<Accumulator, ClientError> {
    let router = Router::for_query(spec, client.options().validator.clone())?;
    let mut session = Session::open(client, ctx, router, SubscriptionListMode::Once).await?;
    let mut acc = Accumulator::new();
    loop {
        match session.next(&mut acc).await? {
            Event::Notification => {}
            Event::Sync | Event::End => break,
        }
    }
    debug!(state = %session.state(), "lookup complete");
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::query::{SingletonQuery, TranslateError, TranslatedPoint};
    use crate::schema::View;
    use ytel_proto::TypedValue;

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    #[test]
    fn out_of_scope_updates_become_strays() {
        let router = Router::for_paths(vec![p("/a")], None);
        let mut acc = Accumulator::new();
        let n = Notification::new(5)
            .with_update(p("/a/x"), "in")
            .with_update(p("/b/y"), "out");
        router.ingest(&mut acc, &n).unwrap();
        assert_eq!(acc.strays().len(), 1);
        assert_eq!(acc.strays()[0].path, p("/b/y"));
        assert_eq!(acc.matching(&p("/a/x")).len(), 1);
    }

    #[test]
    fn validator_rejection_is_kept_with_the_datapoint() {
        let validator: Validator = Arc::new(|dp: &Datapoint| {
            if dp.value == TypedValue::from("bad") {
                anyhow::bail!("value rejected");
            }
            Ok(())
        });
        let router = Router::for_paths(vec![p("/a")], Some(validator));
        let mut acc = Accumulator::new();
        router
            .ingest(&mut acc, &Notification::new(1).with_update(p("/a/x"), "bad"))
            .unwrap();
        let ex = acc.extract_leaf::<String>(&p("/a/x")).unwrap();
        assert_eq!(ex.compliance.validate_errors.len(), 1);
        assert!(ex.compliance.validate_errors[0].contains("value rejected"));
    }

    struct Rename;

    impl Translator for Rename {
        fn input_paths(&self, output: &Path) -> Result<Vec<Path>, TranslateError> {
            if output == &p("/out/v") {
                Ok(vec![p("/in/v")])
            } else {
                Err(TranslateError::NoMatch { path: output.clone() })
            }
        }

        fn translate(
            &self,
            path: &Path,
            value: Option<&TypedValue>,
        ) -> Result<Vec<TranslatedPoint>, TranslateError> {
            if path == &p("/in") && value.is_none() {
                return Ok(vec![TranslatedPoint {
                    path: p("/out/v"),
                    value: None,
                }]);
            }
            if path != &p("/in/v") {
                return Err(TranslateError::Invalid {
                    path: path.clone(),
                    reason: "unexpected input".into(),
                });
            }
            Ok(vec![
                TranslatedPoint {
                    path: p("/out/v"),
                    value: value.cloned(),
                },
                TranslatedPoint {
                    path: p("/out/other"),
                    value: value.cloned(),
                },
            ])
        }
    }

    #[test]
    fn translator_subscribes_to_inputs_and_filters_outputs() {
        let q = SingletonQuery::<String>::leaf(p("/out/v"), View::State)
            .with_translator(Arc::new(Rename))
            .unwrap();
        let router = Router::for_query(q.spec(), None).unwrap();
        assert_eq!(router.subscribed(), &[p("/in/v")]);

        let mut acc = Accumulator::new();
        router
            .ingest(&mut acc, &Notification::new(3).with_update(p("/in/v"), "x"))
            .unwrap();
        assert_eq!(acc.matching(&p("/out/v")).len(), 1);
        assert!(acc.matching(&p("/out/other")).is_empty());
    }

    #[test]
    fn translated_atomic_clear_hits_the_output_path() {
        let q = SingletonQuery::<String>::leaf(p("/out/v"), View::State)
            .with_translator(Arc::new(Rename))
            .unwrap();
        let router = Router::for_query(q.spec(), None).unwrap();
        let mut acc = Accumulator::new();
        router
            .ingest(&mut acc, &Notification::new(3).with_update(p("/in/v"), "x"))
            .unwrap();

        router
            .ingest(&mut acc, &Notification::new(4).with_prefix(p("/in")).atomic())
            .unwrap();
        let ex = acc.extract_leaf::<String>(&p("/out/v")).unwrap();
        assert!(ex.value.is_none());
        assert_eq!(ex.timestamp, Some(4));

        let n = Notification::new(5)
            .with_prefix(p("/in"))
            .with_update(p("/v"), "y")
            .atomic();
        router.ingest(&mut acc, &n).unwrap();
        assert_eq!(acc.extract_leaf::<String>(&p("/out/v")).unwrap().value.as_deref(), Some("y"));
    }

    #[test]
    fn nil_value_rejects_the_whole_notification() {
        let router = Router::for_paths(vec![p("/a")], None);
        let mut acc = Accumulator::new();
        let n = Notification::new(100)
            .with_update(p("/a/x"), "ok")
            .with_delete(p("/a/y"))
            .with_raw_update(ytel_proto::Update { path: p("/a/z"), val: None });
        let err = router.ingest(&mut acc, &n).unwrap_err();
        assert!(matches!(&err, ClientError::Ingest(DecodeError::NilValue { path }) if path == &p("/a/z")), "{err}");
        assert!(acc.is_empty());
        assert!(acc.changed_paths().is_empty());
    }

    #[test]
    fn atomic_notification_replaces_the_prefix_subtree() {
        let router = Router::for_paths(vec![p("/l")], None);
        let mut acc = Accumulator::new();
        let n = Notification::new(1)
            .with_prefix(p("/l[k=a]"))
            .with_update(p("/v"), "x")
            .with_update(p("/w"), "y");
        router.ingest(&mut acc, &n).unwrap();
        let n = Notification::new(2)
            .with_prefix(p("/l[k=a]"))
            .with_update(p("/v"), "z")
            .atomic();
        router.ingest(&mut acc, &n).unwrap();
        assert_eq!(acc.extract_leaf::<String>(&p("/l[k=a]/v")).unwrap().value.as_deref(), Some("z"));
        assert!(acc.extract_leaf::<String>(&p("/l[k=a]/w")).unwrap().value.is_none());
    }

    #[test]
    fn uninvertible_output_path_fails() {
        let q = SingletonQuery::<String>::leaf(p("/elsewhere"), View::State)
            .with_translator(Arc::new(Rename))
            .unwrap();
        let err = Router::for_query(q.spec(), None).err().unwrap();
        assert_eq!(err.to_string(), "did not match on path /elsewhere");
    }
}
