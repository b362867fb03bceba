// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Transport port: the three RPCs the client needs from a connection.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use ytel_proto::{
    GetRequest, GetResponse, SetRequest, SetResponse, Status, SubscribeRequest, SubscribeResponse,
};

/// Server-streamed subscribe responses. The stream ending is end-of-stream;
/// dropping it closes the subscription.
pub type SubscribeStream = Pin<Box<dyn Stream<Item = Result<SubscribeResponse, Status>> + Send>>;

/// A connection to one telemetry server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a subscription.
    async fn subscribe(&self, request: SubscribeRequest) -> Result<SubscribeStream, Status>;

    /// One-shot read.
    async fn get(&self, request: GetRequest) -> Result<GetResponse, Status>;

    /// Apply a batch of mutations.
    async fn set(&self, request: SetRequest) -> Result<SetResponse, Status>;
}
