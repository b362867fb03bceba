// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Hand-written schema bindings for a small example device.
//!
//! ```text
//! /parent/child/{config,state}/{one,two,three}
//! /remote-container/{config,state}/a-leaf
//! /model/a/single-key[key=*]/{config,state}/{key,value,counter,counters}
//! /model/b/ordered-list[key=*]/{config,state}/{key,value}
//! ```
//!
//! `two`, `counter` and `counters` exist only in the state view.

use serde_json::{Map, Value as Json};
use ytel_client::{
    json_member, parse_json, typed_scalar, EncodeOptions, FieldError, FieldOutcome, KeyedList,
    ListEntry, ListKey, OrderedList, Scalar, Typed, View,
};
use ytel_proto::{PathElem, TypedValue};

const SIMPLE: &str = "openconfig-simple";
const WITHLIST: &str = "openconfig-withlistval";

fn names(rel: &[PathElem]) -> Vec<&str> {
    rel.iter().map(PathElem::name).collect()
}

fn set_leaf<T: Scalar>(slot: &mut Option<T>, value: &TypedValue) -> Result<FieldOutcome, FieldError> {
    *slot = Some(T::from_typed(value)?);
    Ok(FieldOutcome::Applied)
}

fn json_leaf<T: Scalar>(slot: &mut Option<T>, obj: &Map<String, Json>, name: &str) -> Result<(), FieldError> {
    if let Some(v) = json_member(obj, name) {
        *slot = Some(T::from_json(v)?);
    }
    Ok(())
}

fn put<T: Scalar>(obj: &mut Map<String, Json>, name: &str, slot: Option<&T>, ietf: bool) {
    if let Some(v) = slot {
        obj.insert(name.to_owned(), v.to_json(ietf));
    }
}

fn other_view(view: View) -> &'static str {
    match view {
        View::State => View::Config.segment(),
        View::Config => View::State.segment(),
    }
}

fn as_object<'a>(json: &'a Json, expected: &'static str) -> Result<&'a Map<String, Json>, FieldError> {
    json.as_object().ok_or(FieldError::WrongType {
        expected,
        found: "json non-object",
    })
}

/// Enumerated leaf `three`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Three {
    /// No value set.
    #[default]
    Unset,
    /// `ONE`.
    One,
    /// `TWO`.
    Two,
}

impl Three {
    fn name(self) -> &'static str {
        match self {
            Self::Unset => "UNSET",
            Self::One => "ONE",
            Self::Two => "TWO",
        }
    }

    fn parse(s: &str) -> Result<Self, FieldError> {
        match s.rsplit_once(':').map_or(s, |(_, bare)| bare) {
            "ONE" => Ok(Self::One),
            "TWO" => Ok(Self::Two),
            other => Err(FieldError::Malformed {
                expected: "Three",
                reason: format!("unknown enumeration value {other:?}"),
            }),
        }
    }
}

impl Scalar for Three {
    fn from_typed(value: &TypedValue) -> Result<Self, FieldError> {
        match value {
            TypedValue::String(s) => Self::parse(s),
            TypedValue::JsonIetf(_) | TypedValue::Json(_) => Self::from_json(&parse_json(value, "Three")?),
            other => Err(FieldError::WrongType {
                expected: "Three",
                found: other.kind(),
            }),
        }
    }

    fn from_json(json: &Json) -> Result<Self, FieldError> {
        json.as_str().ok_or(FieldError::WrongType {
            expected: "Three",
            found: "json non-string",
        })
        .and_then(Self::parse)
    }

    fn to_typed(&self) -> TypedValue {
        TypedValue::String(self.name().to_owned())
    }

    fn to_json(&self, _ietf: bool) -> Json {
        Json::String(self.name().to_owned())
    }
}

typed_scalar!(Three);

/// `/parent/child`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Child {
    /// `one` (config and state).
    pub one: Option<String>,
    /// `two` (state only).
    pub two: Option<String>,
    /// `three` (config and state).
    pub three: Option<Three>,
}

impl Typed for Child {
    fn decode_field(&mut self, rel: &[PathElem], value: &TypedValue, view: View) -> Result<FieldOutcome, FieldError> {
        let Some((head, tail)) = rel.split_first() else {
            return self.decode_json(&parse_json(value, "Child")?, view);
        };
        if head.name() == other_view(view) {
            return Ok(FieldOutcome::Ignored);
        }
        if head.name() != view.segment() {
            return Err(FieldError::unknown(rel));
        }
        match (view, names(tail).as_slice()) {
            (_, ["one"]) => set_leaf(&mut self.one, value),
            (View::State, ["two"]) => set_leaf(&mut self.two, value),
            (_, ["three"]) => set_leaf(&mut self.three, value),
            _ => Err(FieldError::unknown(rel)),
        }
    }

    fn decode_json(&mut self, json: &Json, view: View) -> Result<FieldOutcome, FieldError> {
        let obj = as_object(json, "Child")?;
        let Some(section) = json_member(obj, view.segment()) else {
            return Ok(FieldOutcome::Ignored);
        };
        let section = as_object(section, "Child")?;
        json_leaf(&mut self.one, section, "one")?;
        if view == View::State {
            json_leaf(&mut self.two, section, "two")?;
        }
        json_leaf(&mut self.three, section, "three")?;
        Ok(FieldOutcome::Applied)
    }

    /// Encodes the config view only.
    fn encode_json(&self, opts: &EncodeOptions) -> Json {
        let mut config = Map::new();
        put(&mut config, "one", self.one.as_ref(), opts.ietf);
        put(&mut config, "three", self.three.as_ref(), opts.ietf);
        let mut obj = Map::new();
        obj.insert(opts.member(SIMPLE, "config"), Json::Object(config));
        Json::Object(obj)
    }
}

/// `/parent`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parent {
    /// `child`.
    pub child: Child,
}

impl Typed for Parent {
    fn decode_field(&mut self, rel: &[PathElem], value: &TypedValue, view: View) -> Result<FieldOutcome, FieldError> {
        match rel.split_first() {
            Some((head, tail)) if head.name() == "child" => self.child.decode_field(tail, value, view),
            _ => Err(FieldError::unknown(rel)),
        }
    }

    fn encode_json(&self, opts: &EncodeOptions) -> Json {
        let mut obj = Map::new();
        obj.insert(opts.member(SIMPLE, "child"), self.child.encode_json(&opts.nested()));
        Json::Object(obj)
    }
}

/// `/remote-container`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteContainer {
    /// `a-leaf`.
    pub a_leaf: Option<String>,
}

impl Typed for RemoteContainer {
    fn decode_field(&mut self, rel: &[PathElem], value: &TypedValue, view: View) -> Result<FieldOutcome, FieldError> {
        match names(rel).as_slice() {
            [section, _] if *section == other_view(view) => Ok(FieldOutcome::Ignored),
            [section, "a-leaf"] if *section == view.segment() => set_leaf(&mut self.a_leaf, value),
            _ => Err(FieldError::unknown(rel)),
        }
    }

    fn encode_json(&self, opts: &EncodeOptions) -> Json {
        let mut config = Map::new();
        put(&mut config, "a-leaf", self.a_leaf.as_ref(), opts.ietf);
        let mut obj = Map::new();
        obj.insert(opts.member(SIMPLE, "config"), Json::Object(config));
        Json::Object(obj)
    }
}

/// Entry of `/model/a/single-key`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SingleKey {
    /// `key`.
    pub key: Option<String>,
    /// `value`.
    pub value: Option<i64>,
    /// `counter` (state only, float32).
    pub counter: Option<f32>,
    /// `counters` (state only, float32 leaf-list).
    pub counters: Option<Vec<f32>>,
}

impl Typed for SingleKey {
    fn decode_field(&mut self, rel: &[PathElem], value: &TypedValue, view: View) -> Result<FieldOutcome, FieldError> {
        let path = names(rel);
        match path.as_slice() {
            [] => self.decode_json(&parse_json(value, "SingleKey")?, view),
            ["key"] => set_leaf(&mut self.key, value),
            [section, _] if *section == other_view(view) => Ok(FieldOutcome::Ignored),
            [section, leaf] if *section == view.segment() => match (view, *leaf) {
                (_, "key") => set_leaf(&mut self.key, value),
                (_, "value") => set_leaf(&mut self.value, value),
                (View::State, "counter") => set_leaf(&mut self.counter, value),
                (View::State, "counters") => set_leaf(&mut self.counters, value),
                _ => Err(FieldError::unknown(rel)),
            },
            _ => Err(FieldError::unknown(rel)),
        }
    }

    fn decode_json(&mut self, json: &Json, view: View) -> Result<FieldOutcome, FieldError> {
        let obj = as_object(json, "SingleKey")?;
        json_leaf(&mut self.key, obj, "key")?;
        if let Some(section) = json_member(obj, view.segment()) {
            let section = as_object(section, "SingleKey")?;
            json_leaf(&mut self.key, section, "key")?;
            json_leaf(&mut self.value, section, "value")?;
            if view == View::State {
                json_leaf(&mut self.counter, section, "counter")?;
                json_leaf(&mut self.counters, section, "counters")?;
            }
        }
        Ok(FieldOutcome::Applied)
    }

    fn encode_json(&self, opts: &EncodeOptions) -> Json {
        let mut config = Map::new();
        put(&mut config, "key", self.key.as_ref(), opts.ietf);
        put(&mut config, "value", self.value.as_ref(), opts.ietf);
        let mut obj = Map::new();
        put(&mut obj, "key", self.key.as_ref(), opts.ietf);
        obj.insert(opts.member(WITHLIST, "config"), Json::Object(config));
        Json::Object(obj)
    }
}

impl ListEntry for SingleKey {
    const MODULE: &'static str = WITHLIST;
    const LIST: &'static str = "single-key";
    const KEYS: &'static [&'static str] = &["key"];

    fn key(&self) -> Option<ListKey> {
        self.key.clone().map(|k| vec![k])
    }
}

/// Entry of the user-ordered `/model/b/ordered-list`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderedEntry {
    /// `key`.
    pub key: Option<String>,
    /// `value`.
    pub value: Option<u64>,
}

impl Typed for OrderedEntry {
    fn decode_field(&mut self, rel: &[PathElem], value: &TypedValue, view: View) -> Result<FieldOutcome, FieldError> {
        match names(rel).as_slice() {
            ["key"] => set_leaf(&mut self.key, value),
            [section, _] if *section == other_view(view) => Ok(FieldOutcome::Ignored),
            [section, "key"] if *section == view.segment() => set_leaf(&mut self.key, value),
            [section, "value"] if *section == view.segment() => set_leaf(&mut self.value, value),
            _ => Err(FieldError::unknown(rel)),
        }
    }

    fn decode_json(&mut self, json: &Json, view: View) -> Result<FieldOutcome, FieldError> {
        let obj = as_object(json, "OrderedEntry")?;
        json_leaf(&mut self.key, obj, "key")?;
        if let Some(section) = json_member(obj, view.segment()) {
            let section = as_object(section, "OrderedEntry")?;
            json_leaf(&mut self.value, section, "value")?;
        }
        Ok(FieldOutcome::Applied)
    }

    fn encode_json(&self, opts: &EncodeOptions) -> Json {
        let mut config = Map::new();
        put(&mut config, "key", self.key.as_ref(), opts.ietf);
        put(&mut config, "value", self.value.as_ref(), opts.ietf);
        let mut obj = Map::new();
        put(&mut obj, "key", self.key.as_ref(), opts.ietf);
        obj.insert(opts.member(WITHLIST, "config"), Json::Object(config));
        Json::Object(obj)
    }
}

impl ListEntry for OrderedEntry {
    const MODULE: &'static str = WITHLIST;
    const LIST: &'static str = "ordered-list";
    const KEYS: &'static [&'static str] = &["key"];

    fn key(&self) -> Option<ListKey> {
        self.key.clone().map(|k| vec![k])
    }
}

/// `/model`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    /// `a/single-key`, sorted by key.
    pub single_key: KeyedList<SingleKey>,
    /// `b/ordered-list`, in arrival order.
    pub ordered: OrderedList<OrderedEntry>,
}

impl Typed for Model {
    fn decode_field(&mut self, rel: &[PathElem], value: &TypedValue, view: View) -> Result<FieldOutcome, FieldError> {
        match rel.split_first() {
            Some((head, tail)) if head.name() == "a" => self.single_key.decode_field(tail, value, view),
            Some((head, tail)) if head.name() == "b" => self.ordered.decode_field(tail, value, view),
            _ => Err(FieldError::unknown(rel)),
        }
    }

    fn encode_json(&self, opts: &EncodeOptions) -> Json {
        let nested = opts.nested();
        let mut obj = Map::new();
        obj.insert(opts.member(WITHLIST, "a"), self.single_key.encode_json(&nested));
        obj.insert(opts.member(WITHLIST, "b"), self.ordered.encode_json(&nested));
        Json::Object(obj)
    }
}

/// The whole device tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Device {
    /// `/parent`.
    pub parent: Parent,
    /// `/remote-container`.
    pub remote_container: RemoteContainer,
    /// `/model`.
    pub model: Model,
}

impl Typed for Device {
    fn decode_field(&mut self, rel: &[PathElem], value: &TypedValue, view: View) -> Result<FieldOutcome, FieldError> {
        let Some((head, tail)) = rel.split_first() else {
            return Err(FieldError::unknown(rel));
        };
        match head.name() {
            "parent" => self.parent.decode_field(tail, value, view),
            "remote-container" => self.remote_container.decode_field(tail, value, view),
            "model" => self.model.decode_field(tail, value, view),
            _ => Err(FieldError::unknown(rel)),
        }
    }

    fn encode_json(&self, opts: &EncodeOptions) -> Json {
        let nested = opts.nested();
        let mut obj = Map::new();
        obj.insert(opts.member(SIMPLE, "parent"), self.parent.encode_json(&nested));
        obj.insert(
            opts.member(SIMPLE, "remote-container"),
            self.remote_container.encode_json(&nested),
        );
        obj.insert(opts.member(WITHLIST, "model"), self.model.encode_json(&nested));
        Json::Object(obj)
    }
}
