// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! One-shot reads over the Get RPC.

use tracing::debug;
use ytel_proto::{Code, Encoding, GetRequest, Path, RpcName};

use crate::accumulator::Accumulator;
use crate::client::Client;
use crate::context::Context;
use crate::error::ClientError;
use crate::query::QuerySpec;
use crate::session::Router;

/// Issue one Get for `spec` and accumulate the reply.
///
/// `NotFound` yields an empty accumulator so the caller sees an absent value.
pub(crate) async fn fetch(client: &Client, ctx: &Context, spec: &QuerySpec) -> Result<Accumulator, ClientError> {
    ctx.check()?;
    let router = Router::for_query(spec, client.options().validator.clone())?;
    let request = GetRequest {
        target: client.target().map(str::to_owned),
        prefix: Path::root(),
        path: router.subscribed().to_vec(),
        data_type: spec.view.data_type(),
        encoding: Encoding::JsonIetf,
    };
    debug!(rpc = request.rpc_name(), paths = request.path.len(), "fetching");
    let result = tokio::select! {
        err = ctx.done() => return Err(err),
        res = client.transport().get(request) => res,
    };
    let mut acc = Accumulator::new();
    let response = match result {
        Ok(response) => response,
        Err(status) if status.code == Code::NotFound => {
            debug!(path = %spec.path, "get returned NotFound");
            return Ok(acc);
        }
        Err(status) => return Err(ClientError::Get(status)),
    };
    for n in &response.notification {
        router.ingest(&mut acc, n)?;
    }
    Ok(acc)
}
