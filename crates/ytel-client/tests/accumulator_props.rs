// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Property tests for accumulation and reconstruction.
#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;

use proptest::prelude::*;
use ytel_client::proto::TypedValue;
use ytel_client::{Accumulator, View};
use ytel_dry_tests::paths::{model, ordered_entries, single_key_values, single_keys};
use ytel_dry_tests::path;

fn value_path(key: &str) -> ytel_client::Path {
    path(&format!("/model/a/single-key[key={key}]/state/value"))
}

fn writes() -> impl Strategy<Value = Vec<(String, i64)>> {
    prop::collection::vec(("[a-z]{1,4}", any::<i64>()), 0..12)
}

/// Ordered-list traffic: `Some(v)` writes an element's value, `None` deletes it.
fn ordered_ops() -> impl Strategy<Value = Vec<(String, Option<u64>)>> {
    prop::collection::vec(("[a-e]", prop::option::of(any::<u64>())), 0..24)
}

fn apply_ordered(acc: &mut Accumulator, ops: &[(String, Option<u64>)], first_ts: i64) {
    for (ts, (key, op)) in (first_ts..).zip(ops) {
        acc.begin_cycle();
        let element = path(&format!("/model/b/ordered-list[key={key}]"));
        match op {
            Some(v) => {
                acc.apply_update(&element.concat(&path("/state/value")), TypedValue::Uint(*v), ts);
            }
            None => acc.apply_delete(&element, ts),
        }
    }
}

/// Arrival order: new or re-created elements go to the back.
fn model_order(order: &mut Vec<String>, ops: &[(String, Option<u64>)]) {
    for (key, op) in ops {
        let at = order.iter().position(|k| k == key);
        match (op, at) {
            (Some(_), None) => order.push(key.clone()),
            (None, Some(i)) => {
                order.remove(i);
            }
            _ => {}
        }
    }
}

fn ordered_keys(acc: &Accumulator) -> Vec<String> {
    ordered_entries(View::State)
        .decode_all(acc)
        .iter()
        .map(|v| v.path.last().and_then(|e| e.key("key")).unwrap().to_owned())
        .collect()
}

proptest! {
    #[test]
    fn keyed_list_holds_the_last_write_per_key(writes in writes()) {
        let mut acc = Accumulator::new();
        let mut expected = BTreeMap::new();
        for (ts, (key, v)) in (1_i64..).zip(&writes) {
            acc.begin_cycle();
            acc.apply_update(&value_path(key), TypedValue::Int(*v), ts);
            expected.insert(key.clone(), *v);
        }

        let decoded = model(View::State).decode(&acc).unwrap();
        prop_assert_eq!(decoded.is_present(), !expected.is_empty());
        let list = decoded.into_val().unwrap_or_default().single_key;
        prop_assert_eq!(list.len(), expected.len());
        for (key, v) in &expected {
            prop_assert_eq!(list.by_key(key).and_then(|e| e.value), Some(*v));
        }

        let values: Vec<i64> = single_key_values(View::State)
            .decode_all(&acc)
            .into_iter()
            .filter_map(|v| v.into_val())
            .collect();
        prop_assert_eq!(values, expected.values().copied().collect::<Vec<_>>());
    }

    #[test]
    fn deleted_elements_are_absent(writes in writes(), victim in 0usize..12) {
        prop_assume!(!writes.is_empty());
        let mut acc = Accumulator::new();
        for (key, v) in &writes {
            acc.apply_update(&value_path(key), TypedValue::Int(*v), 1);
        }
        let key = &writes[victim % writes.len()].0;
        let element = path(&format!("/model/a/single-key[key={key}]"));
        acc.apply_delete(&element, 2);

        let keys = single_keys(View::State);
        prop_assert!(!keys.decode_element(&acc, &element).is_present());
        prop_assert!(keys.decode_all(&acc).iter().all(|v| v.path != element));

        // Older data for a deleted element is dropped.
        prop_assert!(!acc.apply_update(&value_path(key), TypedValue::Int(0), 1));
        prop_assert!(acc.apply_update(&value_path(key), TypedValue::Int(0), 3));
        prop_assert!(keys.decode_element(&acc, &element).is_present());
    }

    #[test]
    fn ordered_list_order_is_stable_under_replay(ops in ordered_ops()) {
        let mut first = Accumulator::new();
        let mut second = Accumulator::new();
        apply_ordered(&mut first, &ops, 1);
        apply_ordered(&mut second, &ops, 1);

        let mut expected = Vec::new();
        model_order(&mut expected, &ops);
        prop_assert_eq!(ordered_keys(&first), expected.clone());
        prop_assert_eq!(ordered_keys(&second), expected.clone());

        // Replaying the same stream with later timestamps.
        let offset = i64::try_from(ops.len()).unwrap() + 1;
        apply_ordered(&mut first, &ops, offset);
        model_order(&mut expected, &ops);
        prop_assert_eq!(ordered_keys(&first), expected);
    }
}

#[test]
fn newest_timestamp_wins() {
    let mut acc = Accumulator::new();
    let leaf = value_path("k");
    assert!(acc.apply_update(&leaf, TypedValue::Int(2), 20));
    acc.begin_cycle();
    assert!(!acc.apply_update(&leaf, TypedValue::Int(1), 10));
    let v = single_key_values(View::State).decode_all(&acc);
    assert_eq!(v.len(), 1);
    assert_eq!(v[0].val(), Some(&2));
}
