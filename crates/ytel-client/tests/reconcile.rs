// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Config/state reconcilers over scripted streams.
#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ytel_client::proto::Notification;
use ytel_client::{ClientError, Context, Reconciler, SingletonQuery, UsageError, Value, Verdict, View};
use ytel_dry_tests::paths::{child, remote_container};
use ytel_dry_tests::{fake_client, path, Child, Parent, Script};

fn timeout() -> Context {
    Context::new().with_timeout(Duration::from_secs(30))
}

fn parent(view: View) -> SingletonQuery<Parent> {
    SingletonQuery::container(path("/parent"), view)
}

#[tokio::test(start_paused = true)]
async fn converges_when_state_matches_config() {
    let (client, fake) = fake_client();
    fake.push_script(
        Script::new()
            .notification(
                Notification::new(1)
                    .with_update(path("/parent/child/config/one"), "want")
                    .with_update(path("/parent/child/state/one"), "old"),
            )
            .sync()
            .notification(Notification::new(2).with_update(path("/parent/child/state/one"), "want"))
            .hold_open(),
    );
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let reconciler = Reconciler::new(&client, child(View::Config), child(View::State)).unwrap();
    let mut handle = reconciler.start(&timeout(), move |config: &Value<Child>, state: &Value<Child>| {
        counter.fetch_add(1, Ordering::SeqCst);
        let want = config.val().and_then(|c| c.one.clone());
        let have = state.val().and_then(|s| s.one.clone());
        Verdict::stop_if(want.is_some() && want == have)
    });
    handle.await_done().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let req = &fake.subscribe_requests()[0];
    assert_eq!(req.subscription.len(), 1);
    assert_eq!(req.subscription[0].path, path("/parent/child"));
    assert!(matches!(handle.await_done().await, Err(ClientError::Usage(UsageError::AwaitCalled))));
}

#[tokio::test(start_paused = true)]
async fn sub_reconciler_fires_for_its_own_pair() {
    let (client, fake) = fake_client();
    fake.push_script(
        Script::new()
            .sync()
            .notification(Notification::new(5).with_update(path("/parent/child/state/two"), "done"))
            .hold_open(),
    );
    let roots = Arc::new(AtomicUsize::new(0));
    let root_calls = Arc::clone(&roots);
    let mut reconciler = Reconciler::new(&client, parent(View::Config), parent(View::State)).unwrap();
    reconciler
        .add_sub_reconciler(child(View::Config), child(View::State), |_: &Value<Child>, state: &Value<Child>| {
            Verdict::stop_if(state.val().and_then(|s| s.two.as_deref()) == Some("done"))
        })
        .unwrap();
    let mut handle = reconciler.start(&timeout(), move |_: &Value<Parent>, _: &Value<Parent>| {
        root_calls.fetch_add(1, Ordering::SeqCst);
        Verdict::Continue
    });
    handle.await_done().await.unwrap();
    assert_eq!(roots.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn callback_failure_stops_the_reconciler() {
    let (client, fake) = fake_client();
    fake.push_script(Script::new().sync().hold_open());
    let reconciler = Reconciler::new(&client, child(View::Config), child(View::State)).unwrap();
    let mut handle = reconciler.start(&timeout(), |_: &Value<Child>, _: &Value<Child>| {
        Verdict::Fail(anyhow::anyhow!("cannot converge"))
    });
    let err = handle.await_done().await.unwrap_err();
    assert!(matches!(err, ClientError::Predicate(_)), "{err}");
}

#[tokio::test(start_paused = true)]
async fn cancel_ends_a_running_reconciler() {
    let (client, fake) = fake_client();
    fake.push_script(Script::new().hold_open());
    let reconciler = Reconciler::new(&client, child(View::Config), child(View::State)).unwrap();
    let mut handle = reconciler.start(&timeout(), |_: &Value<Child>, _: &Value<Child>| Verdict::Continue);
    handle.cancel();
    assert!(matches!(handle.await_done().await, Err(ClientError::Cancelled)));
}

#[test]
fn shape_and_prefix_checks() {
    let (client, _fake) = fake_client();
    let err = Reconciler::new(&client, child(View::State), child(View::State)).unwrap_err();
    assert!(matches!(err, UsageError::ReconcilerShape { .. }));

    let mut reconciler = Reconciler::new(&client, child(View::Config), child(View::State)).unwrap();
    let err = reconciler
        .add_sub_reconciler(
            remote_container(View::Config),
            remote_container(View::State),
            |_: &Value<_>, _: &Value<_>| Verdict::Continue,
        )
        .unwrap_err();
    assert!(matches!(err, UsageError::NotAPrefix { .. }));
}
