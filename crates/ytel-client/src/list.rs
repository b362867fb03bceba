// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Keyed list collections.
//!
//! [`KeyedList`] iterates in ascending key order; [`OrderedList`] keeps the
//! order in which keys were first decoded, which is the order the
//! accumulator walks them in (first appearance on the stream).

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde_json::Value as Json;
use ytel_proto::{PathElem, TypedValue};

use crate::schema::{json_member, parse_json, EncodeOptions, FieldError, FieldOutcome, Typed, View};

/// Key tuple of a list entry, in the order the schema declares its keys.
pub type ListKey = Vec<String>;

/// Schema metadata of a list entry type.
pub trait ListEntry: Typed {
    /// Module that defines the list, for qualified JSON names.
    const MODULE: &'static str;
    /// List (element) name.
    const LIST: &'static str;
    /// Key leaf names, in schema order.
    const KEYS: &'static [&'static str];

    /// Key tuple carried by a decoded entry, if its key leaves are set.
    fn key(&self) -> Option<ListKey>;
}

trait Slots<V> {
    fn slot(&mut self, key: ListKey) -> &mut V;
    fn reset(&mut self, entries: Vec<(ListKey, V)>);
}

fn element_key<V: ListEntry>(elem: &PathElem) -> Option<ListKey> {
    if elem.name() != V::LIST {
        return None;
    }
    V::KEYS
        .iter()
        .map(|k| elem.key(k).map(str::to_owned))
        .collect()
}

fn decode_entries<V: ListEntry>(json: &Json, view: View) -> Result<Vec<(ListKey, V)>, FieldError> {
    let items = match json {
        Json::Array(items) => items,
        Json::Object(obj) => json_member(obj, V::LIST)
            .and_then(Json::as_array)
            .ok_or_else(|| FieldError::Malformed {
                expected: V::LIST,
                reason: "missing list member".to_owned(),
            })?,
        _ => {
            return Err(FieldError::WrongType {
                expected: V::LIST,
                found: "json scalar",
            })
        }
    };
    items
        .iter()
        .map(|item| {
            let mut entry = V::default();
            entry.decode_json(item, view)?;
            let key = entry.key().ok_or_else(|| FieldError::Malformed {
                expected: V::LIST,
                reason: "entry without key".to_owned(),
            })?;
            Ok((key, entry))
        })
        .collect()
}

fn decode_into<V: ListEntry, S: Slots<V>>(
    store: &mut S,
    rel: &[PathElem],
    value: &TypedValue,
    view: View,
) -> Result<FieldOutcome, FieldError> {
    match rel.split_first() {
        None => {
            let doc = parse_json(value, V::LIST)?;
            store.reset(decode_entries::<V>(&doc, view)?);
            Ok(FieldOutcome::Applied)
        }
        Some((head, tail)) => {
            let key = element_key::<V>(head).ok_or_else(|| FieldError::unknown(rel))?;
            store.slot(key).decode_field(tail, value, view)
        }
    }
}

fn encode_entries<'a, V: ListEntry>(
    entries: impl Iterator<Item = &'a V>,
    opts: &EncodeOptions,
) -> Json {
    let items = entries.map(|v| v.encode_json(&opts.nested())).collect();
    let mut obj = serde_json::Map::new();
    obj.insert(opts.member(V::MODULE, V::LIST), Json::Array(items));
    Json::Object(obj)
}

/// List reconstructed in ascending key order.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedList<V>(BTreeMap<ListKey, V>);

/// List preserving first-seen key order (`ordered-by user`).
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedList<V>(IndexMap<ListKey, V>);

macro_rules! list_common {
    ($name:ident) => {
        impl<V> Default for $name<V> {
            fn default() -> Self {
                Self(Default::default())
            }
        }

        impl<V: ListEntry> $name<V> {
            /// Empty list.
            pub fn new() -> Self {
                Self::default()
            }

            /// Build from entries, keyed by [`ListEntry::key`]; entries without a key are skipped.
            pub fn from_entries(entries: impl IntoIterator<Item = V>) -> Self {
                let mut list = Self::new();
                for entry in entries {
                    if let Some(key) = entry.key() {
                        list.0.insert(key, entry);
                    }
                }
                list
            }

            /// Insert or replace an entry.
            pub fn insert(&mut self, key: ListKey, entry: V) -> Option<V> {
                self.0.insert(key, entry)
            }

            /// Entry by full key tuple.
            pub fn get(&self, key: &[String]) -> Option<&V> {
                self.0.get(key)
            }

            /// Entry of a single-key list.
            pub fn by_key(&self, key: &str) -> Option<&V> {
                self.0.get(&[key.to_owned()][..])
            }

            /// Number of entries.
            pub fn len(&self) -> usize {
                self.0.len()
            }

            /// True when there are no entries.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Key tuples in iteration order.
            pub fn keys(&self) -> impl Iterator<Item = &ListKey> {
                self.0.keys()
            }

            /// Entries in iteration order.
            pub fn iter(&self) -> impl Iterator<Item = (&ListKey, &V)> {
                self.0.iter()
            }
        }

        impl<V: ListEntry> Typed for $name<V> {
            fn decode_field(
                &mut self,
                rel: &[PathElem],
                value: &TypedValue,
                view: View,
            ) -> Result<FieldOutcome, FieldError> {
                decode_into::<V, _>(self, rel, value, view)
            }

            fn decode_json(&mut self, json: &Json, view: View) -> Result<FieldOutcome, FieldError> {
                self.reset(decode_entries::<V>(json, view)?);
                Ok(FieldOutcome::Applied)
            }

            fn encode_json(&self, opts: &EncodeOptions) -> Json {
                encode_entries(self.0.values(), opts)
            }
        }

        impl<V: ListEntry> FromIterator<V> for $name<V> {
            fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
                Self::from_entries(iter)
            }
        }
    };
}

list_common!(KeyedList);
list_common!(OrderedList);

impl<V: ListEntry> Slots<V> for KeyedList<V> {
    fn slot(&mut self, key: ListKey) -> &mut V {
        self.0.entry(key).or_default()
    }

    fn reset(&mut self, entries: Vec<(ListKey, V)>) {
        self.0 = entries.into_iter().collect();
    }
}

impl<V: ListEntry> Slots<V> for OrderedList<V> {
    fn slot(&mut self, key: ListKey) -> &mut V {
        self.0.entry(key).or_default()
    }

    fn reset(&mut self, entries: Vec<(ListKey, V)>) {
        self.0 = entries.into_iter().collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Entry {
        name: Option<String>,
        mtu: Option<u16>,
    }

    impl Typed for Entry {
        fn decode_field(
            &mut self,
            rel: &[PathElem],
            value: &TypedValue,
            view: View,
        ) -> Result<FieldOutcome, FieldError> {
            match rel.iter().map(PathElem::name).collect::<Vec<_>>().as_slice() {
                ["name"] => self.name = Some(String::from_typed(value)?),
                ["mtu"] => self.mtu = Some(crate::Scalar::from_typed(value)?),
                [] => return self.decode_json(&parse_json(value, "entry")?, view),
                _ => return Err(FieldError::unknown(rel)),
            }
            Ok(FieldOutcome::Applied)
        }

        fn decode_json(&mut self, json: &Json, _view: View) -> Result<FieldOutcome, FieldError> {
            self.name = json.get("name").and_then(Json::as_str).map(str::to_owned);
            Ok(FieldOutcome::Applied)
        }

        fn encode_json(&self, _opts: &EncodeOptions) -> Json {
            serde_json::json!({"name": self.name})
        }
    }

    use crate::Scalar;

    impl ListEntry for Entry {
        const MODULE: &'static str = "test-mod";
        const LIST: &'static str = "entry";
        const KEYS: &'static [&'static str] = &["name"];

        fn key(&self) -> Option<ListKey> {
            self.name.clone().map(|n| vec![n])
        }
    }

    fn elem(key: &str) -> PathElem {
        PathElem::keyed("entry", [("name", key)]).unwrap()
    }

    #[test]
    fn keyed_list_sorts_and_ordered_list_keeps_arrival() {
        let mut keyed = KeyedList::<Entry>::new();
        let mut ordered = OrderedList::<Entry>::new();
        for k in ["b", "c", "a"] {
            let rel = [elem(k), PathElem::new("mtu").unwrap()];
            keyed.decode_field(&rel, &TypedValue::Uint(1500), View::State).unwrap();
            ordered.decode_field(&rel, &TypedValue::Uint(1500), View::State).unwrap();
        }
        let sorted: Vec<_> = keyed.keys().map(|k| k[0].as_str()).collect();
        let arrival: Vec<_> = ordered.keys().map(|k| k[0].as_str()).collect();
        assert_eq!(sorted, ["a", "b", "c"]);
        assert_eq!(arrival, ["b", "c", "a"]);
        assert_eq!(keyed.by_key("a").and_then(|e| e.mtu), Some(1500));
    }

    #[test]
    fn wrong_list_name_is_a_path_error() {
        let mut keyed = KeyedList::<Entry>::new();
        let rel = [PathElem::keyed("other", [("name", "x")]).unwrap()];
        let err = keyed.decode_field(&rel, &TypedValue::Uint(1), View::State).unwrap_err();
        assert!(err.is_path_error());
    }

    #[test]
    fn json_roundtrip_uses_qualified_member() {
        let list: KeyedList<Entry> = ["y", "x"]
            .iter()
            .map(|n| Entry {
                name: Some((*n).to_owned()),
                mtu: None,
            })
            .collect();
        let json = list.encode_json(&EncodeOptions::default());
        assert_eq!(json, serde_json::json!({"test-mod:entry": [{"name": "x"}, {"name": "y"}]}));

        let mut back = KeyedList::<Entry>::new();
        let wire = TypedValue::json_ietf(&json).unwrap();
        back.decode_field(&[], &wire, View::Config).unwrap();
        assert_eq!(back, list);
    }
}
