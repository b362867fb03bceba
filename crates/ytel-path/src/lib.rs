// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Schema paths for ytel.
//!
//! A [`Path`] addresses a node in a hierarchical data tree. It is an ordered
//! sequence of [`PathElem`]s, each of which carries a name and a set of
//! key/value selectors (used to pick one entry of a keyed list). Key order is
//! irrelevant: `a[x=1][y=2]` and `a[y=2][x=1]` are the same element.
//!
//! `*` is the wildcard for both element names and key values. Wildcards only
//! have meaning during matching ([`Path::matches`], [`Path::is_prefix_of`]);
//! stored paths always compare literally.
#![forbid(unsafe_code)]

mod parse;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wildcard token for element names and key values.
pub const WILDCARD: &str = "*";

/// Errors raised while constructing or parsing paths.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// An element was given an empty name.
    #[error("path element {index} has an empty name")]
    EmptyName {
        /// Position of the offending element.
        index: usize,
    },
    /// An element was given an empty key name.
    #[error("element {elem:?} has an empty key name")]
    EmptyKey {
        /// Name of the offending element.
        elem: String,
    },
    /// The same key name was supplied twice for one element.
    #[error("duplicate key {key:?} in element {elem:?}")]
    DuplicateKey {
        /// Name of the offending element.
        elem: String,
        /// Key supplied more than once.
        key: String,
    },
    /// The textual form could not be parsed.
    #[error("invalid path {input:?}: {reason}")]
    Parse {
        /// Input that failed to parse.
        input: String,
        /// What went wrong.
        reason: String,
    },
}

/// One element of a [`Path`]: a name plus key selectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawPathElem")]
pub struct PathElem {
    name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    keys: BTreeMap<String, String>,
}

/// Unchecked wire form; deserialization validates through [`PathElem::keyed`].
#[derive(Deserialize)]
struct RawPathElem {
    name: String,
    #[serde(default)]
    keys: BTreeMap<String, String>,
}

impl TryFrom<RawPathElem> for PathElem {
    type Error = PathError;

    fn try_from(raw: RawPathElem) -> Result<Self, Self::Error> {
        Self::keyed(raw.name, raw.keys)
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str, special: &[char]) -> fmt::Result {
    for c in s.chars() {
        if c == '\\' || special.contains(&c) {
            f.write_str("\\")?;
        }
        write!(f, "{c}")?;
    }
    Ok(())
}

impl PathElem {
    /// Create an element without keys.
    pub fn new(name: impl Into<String>) -> Result<Self, PathError> {
        let name = name.into();
        if name.is_empty() {
            return Err(PathError::EmptyName { index: 0 });
        }
        Ok(Self {
            name,
            keys: BTreeMap::new(),
        })
    }

    /// Create a keyed list element.
    ///
    /// Fails if any key name is empty or repeated.
    pub fn keyed<I, K, V>(name: impl Into<String>, keys: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        keys.into_iter()
            .try_fold(Self::new(name)?, |elem, (k, v)| elem.with_key(k, v))
    }

    /// Add one key selector, consuming the element.
    pub fn with_key(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, PathError> {
        let key = key.into();
        if key.is_empty() {
            return Err(PathError::EmptyKey { elem: self.name });
        }
        if self.keys.contains_key(&key) {
            return Err(PathError::DuplicateKey {
                elem: self.name,
                key,
            });
        }
        self.keys.insert(key, value.into());
        Ok(self)
    }

    /// Element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key selectors, sorted by key name.
    pub fn keys(&self) -> &BTreeMap<String, String> {
        &self.keys
    }

    /// Value of one key selector.
    pub fn key(&self, key: &str) -> Option<&str> {
        self.keys.get(key).map(String::as_str)
    }

    /// True when the name or any key value is the wildcard.
    pub fn has_wildcards(&self) -> bool {
        self.name == WILDCARD || self.keys.values().any(|v| v == WILDCARD)
    }

    /// Key-aware element match.
    ///
    /// Names must be equal unless either side is `*`. A key present on both
    /// sides must carry equal values unless either value is `*`; a key missing
    /// on one side matches anything.
    pub fn matches(&self, other: &PathElem) -> bool {
        let name_ok =
            self.name == other.name || self.name == WILDCARD || other.name == WILDCARD;
        name_ok
            && self.keys.iter().all(|(k, v)| match other.keys.get(k) {
                Some(w) => v == w || v == WILDCARD || w == WILDCARD,
                None => true,
            })
    }
}

impl fmt::Display for PathElem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (k, v) in &self.keys {
            f.write_str("[")?;
            write_escaped(f, k, &['=', ']'])?;
            f.write_str("=")?;
            write_escaped(f, v, &[']'])?;
            f.write_str("]")?;
        }
        Ok(())
    }
}

/// An absolute or relative schema path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Path {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    origin: Option<String>,
    #[serde(default)]
    elems: Vec<PathElem>,
}

impl Path {
    /// The empty path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from already-validated elements.
    pub fn from_elems(elems: impl IntoIterator<Item = PathElem>) -> Self {
        Self {
            origin: None,
            elems: elems.into_iter().collect(),
        }
    }

    /// Build a key-less path from element names.
    pub fn from_names<I, S>(names: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let elems = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| {
                PathElem::new(name).map_err(|_| PathError::EmptyName { index })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_elems(elems))
    }

    /// Parse the canonical string form, e.g. `/a/b[k=v]/c` or `cli:/show`.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        parse::parse(input)
    }

    /// Set the origin (schema namespace) of this path.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        let origin = origin.into();
        self.origin = (!origin.is_empty()).then_some(origin);
        self
    }

    /// Origin of this path, if any.
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Elements in order.
    pub fn elems(&self) -> &[PathElem] {
        &self.elems
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    /// True for the root path.
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Last element, if any.
    pub fn last(&self) -> Option<&PathElem> {
        self.elems.last()
    }

    /// Path without its last element. The root has no parent.
    pub fn parent(&self) -> Option<Path> {
        let (_, head) = self.elems.split_last()?;
        Some(Self {
            origin: self.origin.clone(),
            elems: head.to_vec(),
        })
    }

    /// Append one element.
    pub fn push(&mut self, elem: PathElem) {
        self.elems.push(elem);
    }

    /// Remove and return the last element.
    pub fn pop(&mut self) -> Option<PathElem> {
        self.elems.pop()
    }

    /// First `len` elements of this path (clamped), keeping the origin.
    pub fn truncated(&self, len: usize) -> Path {
        Self {
            origin: self.origin.clone(),
            elems: self.elems[..len.min(self.len())].to_vec(),
        }
    }

    /// Return a new path extended by `elem`.
    pub fn child(&self, elem: PathElem) -> Path {
        let mut out = self.clone();
        out.push(elem);
        out
    }

    /// Concatenate `suffix` onto this path. The receiver's origin wins when set.
    pub fn concat(&self, suffix: &Path) -> Path {
        let mut elems = Vec::with_capacity(self.len() + suffix.len());
        elems.extend(self.elems.iter().cloned());
        elems.extend(suffix.elems.iter().cloned());
        Self {
            origin: self.origin.clone().or_else(|| suffix.origin.clone()),
            elems,
        }
    }

    /// True when any element carries a wildcard.
    pub fn has_wildcards(&self) -> bool {
        self.elems.iter().any(PathElem::has_wildcards)
    }

    fn origin_compatible(&self, other: &Path) -> bool {
        match (&self.origin, &other.origin) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    /// Key-aware prefix test: wildcards on either side match.
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        self.len() <= other.len()
            && self.origin_compatible(other)
            && self
                .elems
                .iter()
                .zip(&other.elems)
                .all(|(a, b)| a.matches(b))
    }

    /// Full-length match of this path against `pattern`.
    pub fn matches(&self, pattern: &Path) -> bool {
        self.len() == pattern.len() && pattern.is_prefix_of(self)
    }

    /// Strip `prefix` (matched key-aware), returning the relative remainder.
    pub fn strip_prefix(&self, prefix: &Path) -> Option<Path> {
        prefix.is_prefix_of(self).then(|| Self {
            origin: None,
            elems: self.elems[prefix.len()..].to_vec(),
        })
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(origin) = &self.origin {
            write!(f, "{origin}:")?;
        }
        if self.elems.is_empty() {
            return f.write_str("/");
        }
        for elem in &self.elems {
            write!(f, "/{elem}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse::parse(s)
    }
}

impl From<Vec<PathElem>> for Path {
    fn from(elems: Vec<PathElem>) -> Self {
        Self::from_elems(elems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Path {
        s.parse().unwrap_or_else(|e| panic!("bad test path {s}: {e}"))
    }

    #[test]
    fn key_order_is_irrelevant() {
        let a = PathElem::keyed("list", [("x", "1"), ("y", "2")]).unwrap();
        let b = PathElem::keyed("list", [("y", "2"), ("x", "1")]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "list[x=1][y=2]");
    }

    #[test]
    fn rejects_empty_names_and_duplicate_keys() {
        assert_eq!(PathElem::new(""), Err(PathError::EmptyName { index: 0 }));
        let dup = PathElem::keyed("list", [("k", "1"), ("k", "2")]);
        assert!(matches!(dup, Err(PathError::DuplicateKey { .. })));
        assert!(matches!(
            Path::from_names(["a", "", "c"]),
            Err(PathError::EmptyName { index: 1 })
        ));
    }

    #[test]
    fn wildcard_matching_is_key_aware() {
        let pattern = p("/model/a/single-key[key=*]/state/value");
        assert!(p("/model/a/single-key[key=10]/state/value").matches(&pattern));
        assert!(!p("/model/a/single-key[key=10]/config/value").matches(&pattern));
        assert!(!p("/model/a/single-key[key=10]/state").matches(&pattern));
        // A key missing on one side is a wildcard for that key.
        assert!(p("/model/a/single-key[key=10]").matches(&p("/model/a/single-key")));
    }

    #[test]
    fn prefix_matches_wildcards_on_either_side() {
        assert!(p("/a/b").is_prefix_of(&p("/a/b/c")));
        assert!(p("/a/b").is_prefix_of(&p("/a/b")));
        assert!(!p("/a/c").is_prefix_of(&p("/a/b/c")));
        assert!(p("/a/*/c").is_prefix_of(&p("/a/b/c/d")));
        assert!(p("/a/b[k=1]").is_prefix_of(&p("/a/b[k=*]/c")));
        assert!(p("/").is_prefix_of(&p("/x")));
        assert!(!p("/a/b/c").is_prefix_of(&p("/a/b")));
    }

    #[test]
    fn strip_prefix_returns_relative_tail() {
        let rel = p("/parent/child/state/one")
            .strip_prefix(&p("/parent/child"))
            .unwrap();
        assert_eq!(rel, p("/state/one"));
        assert!(p("/x/y").strip_prefix(&p("/parent")).is_none());
    }

    #[test]
    fn concat_prefers_prefix_origin() {
        let prefix = p("/a").with_origin("openconfig");
        let joined = prefix.concat(&p("/b[k=v]"));
        assert_eq!(joined.to_string(), "openconfig:/a/b[k=v]");
        assert_eq!(Path::root().concat(&p("/x")), p("/x"));
    }

    #[test]
    fn parent_and_last() {
        let path = p("/a/b[k=v]");
        assert_eq!(path.last().map(PathElem::name), Some("b"));
        assert_eq!(path.parent(), Some(p("/a")));
        assert_eq!(Path::root().parent(), None);
    }
}
