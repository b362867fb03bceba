// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Query builders for the example schema.

use ytel_client::{OrderedList, SingletonQuery, View, WildcardQuery};
use ytel_proto::Path;

use crate::schema::{Child, Device, Model, OrderedEntry, RemoteContainer, SingleKey, Three};

/// Parse a fixture path.
///
/// # Panics
/// Panics on malformed input; fixtures are literals.
#[allow(clippy::expect_used)]
pub fn path(s: &str) -> Path {
    Path::parse(s).expect("fixture path must parse")
}

fn view_path(base: &str, view: View, leaf: &str) -> Path {
    path(&format!("{base}/{}/{leaf}", view.segment()))
}

/// The whole device, state view.
pub fn device() -> SingletonQuery<Device> {
    SingletonQuery::container(Path::root(), View::State)
}

/// `/parent/child` container.
pub fn child(view: View) -> SingletonQuery<Child> {
    SingletonQuery::container(path("/parent/child"), view)
}

/// `/parent/child/<view>/one`.
pub fn child_one(view: View) -> SingletonQuery<String> {
    SingletonQuery::leaf(view_path("/parent/child", view, "one"), view)
}

/// `/parent/child/state/two`.
pub fn child_two() -> SingletonQuery<String> {
    SingletonQuery::leaf(view_path("/parent/child", View::State, "two"), View::State)
}

/// `/parent/child/<view>/three`.
pub fn child_three(view: View) -> SingletonQuery<Three> {
    SingletonQuery::leaf(view_path("/parent/child", view, "three"), view)
}

/// `/remote-container` container.
pub fn remote_container(view: View) -> SingletonQuery<RemoteContainer> {
    SingletonQuery::container(path("/remote-container"), view)
}

/// `/remote-container/<view>/a-leaf`.
pub fn remote_a_leaf(view: View) -> SingletonQuery<String> {
    SingletonQuery::leaf(view_path("/remote-container", view, "a-leaf"), view)
}

/// `/model` container.
pub fn model(view: View) -> SingletonQuery<Model> {
    SingletonQuery::container(path("/model"), view)
}

fn single_key_base(key: &str) -> String {
    format!("/model/a/single-key[key={key}]")
}

/// One `single-key` entry.
pub fn single_key(key: &str, view: View) -> SingletonQuery<SingleKey> {
    SingletonQuery::container(path(&single_key_base(key)), view)
}

/// Every `single-key` entry.
pub fn single_keys(view: View) -> WildcardQuery<SingleKey> {
    WildcardQuery::container(path(&single_key_base("*")), view)
}

/// `value` of one `single-key` entry.
pub fn single_key_value(key: &str, view: View) -> SingletonQuery<i64> {
    SingletonQuery::leaf(view_path(&single_key_base(key), view, "value"), view)
}

/// `value` of every `single-key` entry.
pub fn single_key_values(view: View) -> WildcardQuery<i64> {
    WildcardQuery::leaf(view_path(&single_key_base("*"), view, "value"), view)
}

/// `counter` (float32) of one `single-key` entry.
pub fn single_key_counter(key: &str) -> SingletonQuery<f32> {
    SingletonQuery::leaf(view_path(&single_key_base(key), View::State, "counter"), View::State)
}

/// `counters` (float32 leaf-list) of one `single-key` entry.
pub fn single_key_counters(key: &str) -> SingletonQuery<Vec<f32>> {
    SingletonQuery::leaf(view_path(&single_key_base(key), View::State, "counters"), View::State)
}

/// The user-ordered list under `/model/b`.
pub fn ordered_list(view: View) -> SingletonQuery<OrderedList<OrderedEntry>> {
    SingletonQuery::container(path("/model/b"), view)
}

/// Every `ordered-list` entry, in arrival order.
pub fn ordered_entries(view: View) -> WildcardQuery<OrderedEntry> {
    WildcardQuery::container(path("/model/b/ordered-list[key=*]"), view).ordered()
}
