// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scripted [`Transport`] fake.
//!
//! Each `subscribe` call pops the next [`Script`]; `get` and `set` pop
//! stubbed replies. Every request is recorded for later inspection.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use ytel_client::{SubscribeStream, Transport};
use ytel_proto::{
    Code, GetRequest, GetResponse, Notification, SetRequest, SetResponse, Status, SubscribeRequest,
    SubscribeResponse, UpdateResult,
};

/// Responses for one subscribe call.
#[derive(Debug, Clone, Default)]
pub struct Script {
    items: Vec<Result<SubscribeResponse, Status>>,
    hold_open: bool,
    reject: Option<Status>,
}

impl Script {
    /// Empty script: the stream ends immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the subscribe call itself.
    pub fn rejected(status: Status) -> Self {
        Self {
            reject: Some(status),
            ..Self::default()
        }
    }

    /// Send a notification.
    pub fn notification(mut self, n: Notification) -> Self {
        self.items.push(Ok(SubscribeResponse::Update(n)));
        self
    }

    /// Send a sync marker.
    pub fn sync(mut self) -> Self {
        self.items.push(Ok(SubscribeResponse::SyncResponse));
        self
    }

    /// Fail the stream mid-flight.
    pub fn error(mut self, status: Status) -> Self {
        self.items.push(Err(status));
        self
    }

    /// Keep the stream open after the scripted items instead of ending it.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    fn into_stream(self) -> SubscribeStream {
        let scripted = stream::iter(self.items);
        if self.hold_open {
            scripted.chain(stream::pending()).boxed()
        } else {
            scripted.boxed()
        }
    }
}

#[derive(Debug, Default)]
struct Recorded {
    scripts: VecDeque<Script>,
    gets: VecDeque<Result<GetResponse, Status>>,
    sets: VecDeque<Result<SetResponse, Status>>,
    subscribe_requests: Vec<SubscribeRequest>,
    get_requests: Vec<GetRequest>,
    set_requests: Vec<SetRequest>,
}

/// Fake telemetry target. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    inner: Arc<Mutex<Recorded>>,
}

impl FakeTransport {
    /// Fake with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the script for the next subscribe call.
    pub fn push_script(&self, script: Script) -> &Self {
        self.lock().scripts.push_back(script);
        self
    }

    /// Queue the reply for the next get call.
    pub fn push_get(&self, reply: Result<GetResponse, Status>) -> &Self {
        self.lock().gets.push_back(reply);
        self
    }

    /// Queue the reply for the next set call.
    pub fn push_set(&self, reply: Result<SetResponse, Status>) -> &Self {
        self.lock().sets.push_back(reply);
        self
    }

    /// Subscribe requests received so far.
    pub fn subscribe_requests(&self) -> Vec<SubscribeRequest> {
        self.lock().subscribe_requests.clone()
    }

    /// Get requests received so far.
    pub fn get_requests(&self) -> Vec<GetRequest> {
        self.lock().get_requests.clone()
    }

    /// Set requests received so far.
    pub fn set_requests(&self) -> Vec<SetRequest> {
        self.lock().set_requests.clone()
    }

    /// Scripts not consumed yet.
    pub fn pending_scripts(&self) -> usize {
        self.lock().scripts.len()
    }
}

fn unscripted(rpc: &str) -> Status {
    Status::new(Code::Unavailable, format!("no {rpc} response scripted"))
}

#[async_trait]
impl Transport for FakeTransport {
    async fn subscribe(&self, request: SubscribeRequest) -> Result<SubscribeStream, Status> {
        let script = {
            let mut inner = self.lock();
            inner.subscribe_requests.push(request);
            inner.scripts.pop_front()
        };
        let script = script.ok_or_else(|| unscripted("subscribe"))?;
        match script.reject.clone() {
            Some(status) => Err(status),
            None => Ok(script.into_stream()),
        }
    }

    async fn get(&self, request: GetRequest) -> Result<GetResponse, Status> {
        let mut inner = self.lock();
        inner.get_requests.push(request);
        inner.gets.pop_front().unwrap_or_else(|| Err(unscripted("get")))
    }

    /// Unstubbed sets succeed and acknowledge every operation.
    async fn set(&self, request: SetRequest) -> Result<SetResponse, Status> {
        let mut inner = self.lock();
        let reply = inner.sets.pop_front().unwrap_or_else(|| Ok(acknowledge(&request, 0)));
        inner.set_requests.push(request);
        reply
    }
}

/// Acknowledgement listing every operation in `request`, stamped `timestamp`.
pub fn acknowledge(request: &SetRequest, timestamp: i64) -> SetResponse {
    use ytel_proto::SetOp;
    let ops = request
        .delete
        .iter()
        .map(|p| (p, SetOp::Delete))
        .chain(request.replace.iter().map(|u| (&u.path, SetOp::Replace)))
        .chain(request.update.iter().map(|u| (&u.path, SetOp::Update)))
        .chain(request.union_replace.iter().map(|u| (&u.path, SetOp::UnionReplace)));
    SetResponse {
        prefix: request.prefix.clone(),
        response: ops
            .map(|(path, op)| UpdateResult {
                path: path.clone(),
                op,
            })
            .collect(),
        timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ytel_proto::{Encoding, Path, SubscriptionListMode};

    fn once() -> SubscribeRequest {
        SubscribeRequest {
            target: None,
            prefix: Path::root(),
            subscription: Vec::new(),
            mode: SubscriptionListMode::Once,
            encoding: Encoding::JsonIetf,
        }
    }

    #[tokio::test]
    async fn scripts_are_consumed_in_order() {
        let fake = FakeTransport::new();
        fake.push_script(Script::new().sync())
            .push_script(Script::rejected(Status::unknown("nope")));
        let mut first = fake.subscribe(once()).await.unwrap();
        assert!(matches!(first.next().await, Some(Ok(SubscribeResponse::SyncResponse))));
        assert!(first.next().await.is_none());
        assert!(fake.subscribe(once()).await.is_err());
        assert!(fake.subscribe(once()).await.is_err());
        assert_eq!(fake.subscribe_requests().len(), 3);
    }

    #[tokio::test]
    async fn unstubbed_set_acknowledges_everything() {
        let fake = FakeTransport::new();
        let request = SetRequest {
            delete: vec![Path::parse("/a").unwrap()],
            ..SetRequest::default()
        };
        let reply = fake.set(request).await.unwrap();
        assert_eq!(reply.response.len(), 1);
        assert_eq!(fake.set_requests().len(), 1);
    }
}
