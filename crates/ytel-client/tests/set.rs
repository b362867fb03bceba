// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Mutations: request shape, encodings and failure reporting.
#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use ytel_client::proto::{Code, Notification, SetResponse, Status, TypedValue};
use ytel_client::{
    time_from_nanos, ClientError, Context, EncodeError, Json, Options, SetBatch, SetEncoding, UsageError, View,
};
use ytel_dry_tests::paths::{child, child_one, child_three, remote_container};
use ytel_dry_tests::{fake_client, path, Child, RemoteContainer, Script, Three};

fn json_of(v: Option<&TypedValue>) -> serde_json::Value {
    v.and_then(TypedValue::as_json).unwrap().unwrap()
}

#[tokio::test]
async fn update_leaf_sends_compact_json_ietf() {
    let (client, fake) = fake_client();
    let client = client.with_target("dut");
    client.update(&Context::new(), &child_one(View::Config), "foo".to_owned()).await.unwrap();

    let reqs = fake.set_requests();
    assert_eq!(reqs.len(), 1);
    let req = &reqs[0];
    assert_eq!(req.target.as_deref(), Some("dut"));
    assert_eq!(req.update.len(), 1);
    assert_eq!(req.update[0].path, path("/parent/child/config/one"));
    assert_eq!(req.update[0].val, Some(TypedValue::JsonIetf(b"\"foo\"".to_vec())));
    assert!(req.replace.is_empty() && req.delete.is_empty());
}

#[tokio::test]
async fn replace_container_uses_module_qualified_members() {
    let (client, fake) = fake_client();
    let value = Child {
        one: Some("foo".into()),
        two: None,
        three: Some(Three::One),
    };
    client.replace(&Context::new(), &child(View::Config), value).await.unwrap();

    let req = &fake.set_requests()[0];
    assert_eq!(req.replace[0].path, path("/parent/child"));
    let doc = json_of(req.replace[0].val.as_ref());
    assert_eq!(doc["openconfig-simple:config"]["one"], "foo");
    assert_eq!(doc["openconfig-simple:config"]["three"], "ONE");
}

#[tokio::test]
async fn replaced_container_reads_back_from_its_echo() {
    let (client, fake) = fake_client();
    let ctx = Context::new();
    let value = Child {
        one: Some("echo".into()),
        two: None,
        three: Some(Three::Two),
    };
    client.replace(&ctx, &child(View::Config), value.clone()).await.unwrap();

    let sent = fake.set_requests()[0].replace[0].clone();
    fake.push_script(
        Script::new()
            .notification(Notification::new(1).with_update(sent.path, sent.val.unwrap()))
            .sync(),
    );
    let got = client.get(&ctx, &child(View::Config)).await.unwrap();
    assert_eq!(got, value);
}

#[tokio::test]
async fn plain_json_without_module_names() {
    let (client, fake) = fake_client();
    let client = client.with_options(Options::new().with_encoding(SetEncoding::Json).with_module_names(false));
    let value = RemoteContainer {
        a_leaf: Some("x".into()),
    };
    client.update(&Context::new(), &remote_container(View::Config), value).await.unwrap();

    let req = &fake.set_requests()[0];
    let val = req.update[0].val.as_ref().unwrap();
    assert!(matches!(val, TypedValue::Json(_)));
    let doc = json_of(Some(val));
    assert_eq!(doc["config"]["a-leaf"], "x");
}

#[tokio::test]
async fn prefer_proto_sends_native_scalars_for_leaves() {
    let (client, fake) = fake_client();
    let client = client.with_options(Options::new().with_encoding(SetEncoding::PreferProto));
    client.update(&Context::new(), &child_three(View::Config), Three::Two).await.unwrap();
    let req = &fake.set_requests()[0];
    assert_eq!(req.update[0].val, Some(TypedValue::String("TWO".into())));
}

#[tokio::test]
async fn batch_orders_operations_by_kind() {
    let (client, fake) = fake_client();
    let mut batch = SetBatch::new();
    batch
        .update(&child_one(View::Config), "u".to_owned())
        .unwrap()
        .delete(&remote_container(View::Config))
        .unwrap()
        .replace(&child_three(View::Config), Three::One)
        .unwrap();
    batch.union_replace_cli("vendor", "hostname dut\n");
    batch.update_schemaless(path("/system").with_origin("native"), Json(serde_json::json!({"k": 1})));
    assert_eq!(batch.len(), 5);

    let result = batch.set(&client, &Context::new()).await.unwrap();
    assert_eq!(result.raw_response.response.len(), 5);

    let req = &fake.set_requests()[0];
    assert_eq!(req.delete, vec![path("/remote-container")]);
    assert_eq!(req.replace.len(), 1);
    assert_eq!(req.update.len(), 2);
    assert_eq!(req.union_replace.len(), 1);
    assert_eq!(req.union_replace[0].path.origin(), Some("vendor_cli"));
    assert_eq!(req.union_replace[0].val, Some(TypedValue::Ascii("hostname dut\n".into())));
    assert!(matches!(req.update[1].val, Some(TypedValue::Json(_))));
}

#[tokio::test]
async fn response_timestamp_is_reported() {
    let (client, fake) = fake_client();
    fake.push_set(Ok(SetResponse {
        timestamp: 42,
        ..SetResponse::default()
    }));
    let result = client.delete(&Context::new(), &child_one(View::Config)).await.unwrap();
    assert_eq!(result.timestamp, time_from_nanos(42));
    assert_eq!(fake.set_requests()[0].delete, vec![path("/parent/child/config/one")]);
}

#[tokio::test]
async fn set_failure_keeps_the_status() {
    let (client, fake) = fake_client();
    fake.push_set(Err(Status::new(Code::FailedPrecondition, "locked")));
    let err = client.update(&Context::new(), &child_one(View::Config), "x".to_owned()).await.unwrap_err();
    assert!(matches!(err, ClientError::Set(_)));
    assert_eq!(err.status().map(|s| s.code), Some(Code::FailedPrecondition));
    assert!(std::error::Error::source(&err).is_some());
}

#[tokio::test]
async fn schemaless_values_need_a_foreign_origin() {
    let (client, fake) = fake_client();
    let mut batch = SetBatch::new();
    batch.replace_schemaless(path("/system"), "text".to_owned());
    let err = batch.set(&client, &Context::new()).await.unwrap_err();
    assert!(matches!(err, ClientError::Encode(EncodeError::UnsupportedOrigin { .. })), "{err}");

    let mut batch = SetBatch::new();
    batch.replace_schemaless(path("/system").with_origin("openconfig"), "text".to_owned());
    assert!(batch.set(&client, &Context::new()).await.is_err());
    assert!(fake.set_requests().is_empty());
}

#[tokio::test]
async fn state_queries_cannot_be_written() {
    let (client, fake) = fake_client();
    let err = client.update(&Context::new(), &child_one(View::State), "x".to_owned()).await.unwrap_err();
    assert!(matches!(err, ClientError::Usage(UsageError::StateQuery { .. })));
    assert!(fake.set_requests().is_empty());
}

#[tokio::test]
async fn cancelled_context_sends_nothing() {
    let (client, fake) = fake_client();
    let ctx = Context::new();
    ctx.cancel();
    let err = client.update(&ctx, &child_one(View::Config), "x".to_owned()).await.unwrap_err();
    assert!(matches!(err, ClientError::Cancelled));
    assert!(fake.set_requests().is_empty());
}
