// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Streaming: watches, awaits and collectors over scripted streams.
#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ytel_client::proto::{Code, Notification, Status, SubscriptionListMode, SubscriptionMode};
use ytel_client::{ClientError, Context, Options, UsageError, Value, Verdict, View};
use ytel_dry_tests::paths::{child, child_one, single_key_values};
use ytel_dry_tests::{fake_client, path, Script};

const ONE: &str = "/parent/child/state/one";

fn one_at(ts: i64, v: &str) -> Notification {
    Notification::new(ts).with_update(path(ONE), v)
}

fn timeout() -> Context {
    Context::new().with_timeout(Duration::from_secs(30))
}

#[tokio::test(start_paused = true)]
async fn await_value_resolves_on_a_later_notification() {
    let (client, fake) = fake_client();
    fake.push_script(
        Script::new()
            .notification(one_at(1, "a"))
            .sync()
            .notification(one_at(2, "b"))
            .hold_open(),
    );
    let got = client.await_value(&timeout(), &child_one(View::State), "b".to_owned()).await.unwrap();
    assert_eq!(got.val().map(String::as_str), Some("b"));

    let req = &fake.subscribe_requests()[0];
    assert_eq!(req.mode, SubscriptionListMode::Stream);
}

#[tokio::test(start_paused = true)]
async fn stream_end_before_match_is_end_of_stream() {
    let (client, fake) = fake_client();
    fake.push_script(Script::new().notification(one_at(1, "a")).sync());
    let err = client.await_value(&timeout(), &child_one(View::State), "z".to_owned()).await.unwrap_err();
    assert!(matches!(err, ClientError::EndOfStream), "{err}");
}

#[tokio::test(start_paused = true)]
async fn deadline_ends_an_unsatisfied_watch() {
    let (client, fake) = fake_client();
    fake.push_script(Script::new().notification(one_at(1, "a")).sync().hold_open());
    let ctx = Context::new().with_timeout(Duration::from_millis(50));
    let err = client.await_value(&ctx, &child_one(View::State), "z".to_owned()).await.unwrap_err();
    assert!(matches!(err, ClientError::DeadlineExceeded), "{err}");
    assert!(err.is_context());
}

#[tokio::test(start_paused = true)]
async fn sync_without_data_evaluates_an_absent_value() {
    let (client, fake) = fake_client();
    fake.push_script(Script::new().sync().hold_open());
    let mut watcher = client.watch(&timeout(), &child_one(View::State), |v: &Value<String>| {
        Verdict::stop_if(!v.is_present())
    });
    let got = watcher.await_value().await.unwrap();
    assert!(!got.is_present());
    assert_eq!(watcher.last_value().map(|v| v.path), Some(path(ONE)));
}

#[tokio::test(start_paused = true)]
async fn cancel_and_double_await() {
    let (client, fake) = fake_client();
    fake.push_script(Script::new().hold_open());
    let mut watcher = client.watch(&timeout(), &child_one(View::State), |_: &Value<String>| Verdict::Continue);
    watcher.cancel();
    let err = watcher.await_value().await.unwrap_err();
    assert!(matches!(err, ClientError::Cancelled), "{err}");
    let err = watcher.await_value().await.unwrap_err();
    assert!(matches!(err, ClientError::Usage(UsageError::AwaitCalled)), "{err}");
}

#[tokio::test(start_paused = true)]
async fn cancelling_the_parent_context_stops_the_watch() {
    let (client, fake) = fake_client();
    fake.push_script(Script::new().hold_open());
    let parent = Context::new();
    let mut watcher = client.watch(&parent, &child_one(View::State), |_: &Value<String>| Verdict::Continue);
    parent.cancel();
    assert!(matches!(watcher.await_value().await, Err(ClientError::Cancelled)));
}

#[tokio::test(start_paused = true)]
async fn failing_predicate_aborts_with_its_error() {
    let (client, fake) = fake_client();
    fake.push_script(Script::new().notification(one_at(1, "bad")).hold_open());
    let mut watcher = client.watch(&timeout(), &child_one(View::State), |v: &Value<String>| {
        if v.val().is_some_and(|s| s == "bad") {
            Verdict::Fail(anyhow::anyhow!("saw a bad value"))
        } else {
            Verdict::Continue
        }
    });
    let err = watcher.await_value().await.unwrap_err();
    assert!(matches!(err, ClientError::Predicate(_)));
    assert!(err.to_string().contains("saw a bad value"));
}

#[tokio::test(start_paused = true)]
async fn stream_errors_surface_with_their_status() {
    let (client, fake) = fake_client();
    fake.push_script(
        Script::new()
            .notification(one_at(1, "a"))
            .error(Status::new(Code::Unavailable, "link down")),
    );
    let err = client.await_value(&timeout(), &child_one(View::State), "z".to_owned()).await.unwrap_err();
    assert!(matches!(err, ClientError::Receive(_)), "{err}");
    assert_eq!(err.status().map(|s| s.code), Some(Code::Unavailable));
}

#[tokio::test(start_paused = true)]
async fn sample_options_reach_the_subscription() {
    let (client, fake) = fake_client();
    let client = client.with_options(
        Options::new()
            .with_mode(SubscriptionMode::Sample)
            .with_sample_interval(Duration::from_secs(1)),
    );
    fake.push_script(Script::new().notification(one_at(1, "a")).hold_open());
    client.await_value(&timeout(), &child_one(View::State), "a".to_owned()).await.unwrap();
    let sub = &fake.subscribe_requests()[0].subscription[0];
    assert_eq!(sub.mode, SubscriptionMode::Sample);
    assert_eq!(sub.sample_interval, 1_000_000_000);
}

#[tokio::test(start_paused = true)]
async fn container_watch_sees_atomic_replacement() {
    let (client, fake) = fake_client();
    fake.push_script(
        Script::new()
            .notification(
                Notification::new(1)
                    .with_prefix(path("/parent/child"))
                    .with_update(path("state/one"), "a")
                    .with_update(path("state/two"), "b"),
            )
            .sync()
            .notification(
                Notification::new(2)
                    .with_prefix(path("/parent/child"))
                    .with_update(path("state/one"), "c")
                    .atomic(),
            )
            .hold_open(),
    );
    let mut watcher = client.watch(&timeout(), &child(View::State), |v: &Value<ytel_dry_tests::Child>| {
        Verdict::stop_if(v.val().is_some_and(|c| c.one.as_deref() == Some("c")))
    });
    let got = watcher.await_value().await.unwrap().into_val().unwrap();
    assert_eq!(got.one.as_deref(), Some("c"));
    assert_eq!(got.two, None);
}

#[tokio::test(start_paused = true)]
async fn watch_all_reports_each_changed_element_and_deletes() {
    let (client, fake) = fake_client();
    fake.push_script(
        Script::new()
            .notification(
                Notification::new(1)
                    .with_update(path("/model/a/single-key[key=a]/state/value"), 1_i64)
                    .with_update(path("/model/a/single-key[key=b]/state/value"), 2_i64),
            )
            .sync()
            .notification(Notification::new(3).with_delete(path("/model/a/single-key[key=a]")))
            .hold_open(),
    );
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut watcher = client.watch_all(&timeout(), &single_key_values(View::State), move |v: &Value<i64>| {
        sink.lock().unwrap().push(v.val().copied());
        Verdict::stop_if(!v.is_present())
    });
    let last = watcher.await_value().await.unwrap();
    assert_eq!(last.path, path("/model/a/single-key[key=a]/state/value"));
    assert_eq!(*seen.lock().unwrap(), vec![Some(1), Some(2), None]);
}

#[tokio::test(start_paused = true)]
async fn collect_records_until_the_deadline() {
    let (client, fake) = fake_client();
    fake.push_script(
        Script::new()
            .notification(one_at(1, "a"))
            .sync()
            .notification(one_at(2, "b"))
            .notification(one_at(3, "c"))
            .hold_open(),
    );
    let ctx = Context::new().with_timeout(Duration::from_secs(1));
    let mut collector = client.collect(&ctx, &child_one(View::State));
    let collected = collector.await_values().await.unwrap();
    let values: Vec<&str> = collected.values.iter().filter_map(|v| v.val().map(String::as_str)).collect();
    assert_eq!(values, vec!["a", "b", "c"]);
    assert!(matches!(collected.end, ClientError::DeadlineExceeded));
    assert!(matches!(collector.await_values().await, Err(ClientError::Usage(UsageError::AwaitCalled))));
}

#[tokio::test(start_paused = true)]
async fn collect_all_reports_end_of_stream() {
    let (client, fake) = fake_client();
    fake.push_script(
        Script::new()
            .notification(Notification::new(1).with_update(path("/model/a/single-key[key=x]/state/value"), 7_i64))
            .sync(),
    );
    let mut collector = client.collect_all(&timeout(), &single_key_values(View::State));
    let collected = collector.await_values().await.unwrap();
    assert_eq!(collected.values.len(), 1);
    assert!(matches!(collected.end, ClientError::EndOfStream));
}
