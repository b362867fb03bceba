// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed queries, batches and functional translators.
//!
//! A query pins everything needed to subscribe and decode: the target path
//! (possibly wildcarded), leaf vs. container shape, the view, the paths to
//! subscribe to, and the payload type `T` whose [`Typed`] implementation
//! decodes it. Queries are immutable and cheap to clone.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use thiserror::Error;
use ytel_proto::{Path, TypedValue};

use crate::accumulator::{Accumulator, Extracted};
use crate::error::{ClientError, UsageError};
use crate::schema::{Typed, View};
use crate::value::{time_from_nanos, Value};

/// A translator could not map a path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    /// The output path is not one this translator produces.
    #[error("did not match on path {path}")]
    NoMatch {
        /// Path that did not match.
        path: Path,
    },
    /// An input datapoint could not be translated.
    #[error("cannot translate {path}: {reason}")]
    Invalid {
        /// Input path.
        path: Path,
        /// What went wrong.
        reason: String,
    },
}

/// One translated datapoint; a `None` value is a delete.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedPoint {
    /// Output path.
    pub path: Path,
    /// Output value.
    pub value: Option<TypedValue>,
}

/// Functional translator: derives an output leaf from other wire paths.
pub trait Translator: Send + Sync {
    /// Input paths to subscribe to in order to produce `output`.
    fn input_paths(&self, output: &Path) -> Result<Vec<Path>, TranslateError>;

    /// Translate one input update (`None` value for deletes).
    fn translate(
        &self,
        path: &Path,
        value: Option<&TypedValue>,
    ) -> Result<Vec<TranslatedPoint>, TranslateError>;
}

#[derive(Clone)]
pub(crate) struct QuerySpec {
    pub(crate) path: Path,
    pub(crate) subscribe: Vec<Path>,
    pub(crate) leaf: bool,
    pub(crate) view: View,
    pub(crate) ordered: bool,
    pub(crate) translator: Option<Arc<dyn Translator>>,
}

impl fmt::Debug for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySpec")
            .field("path", &self.path)
            .field("subscribe", &self.subscribe)
            .field("leaf", &self.leaf)
            .field("view", &self.view)
            .field("ordered", &self.ordered)
            .field("translated", &self.translator.is_some())
            .finish()
    }
}

impl QuerySpec {
    fn new(path: Path, leaf: bool, view: View) -> Self {
        Self {
            subscribe: vec![path.clone()],
            path,
            leaf,
            view,
            ordered: false,
            translator: None,
        }
    }
}

fn into_value<T>(path: Path, ex: Extracted<T>) -> Value<T> {
    let mut value = match ex.value {
        Some(v) => Value::present(path, v),
        None => Value::absent(path),
    };
    value.timestamp = ex.timestamp.map(time_from_nanos);
    value.recv_timestamp = ex.recv_timestamp;
    value.compliance_errors = (!ex.compliance.is_empty()).then_some(ex.compliance);
    value
}

macro_rules! query_common {
    ($name:ident) => {
        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                Self {
                    spec: Arc::clone(&self.spec),
                    _payload: PhantomData,
                }
            }
        }

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.spec).finish()
            }
        }

        impl<T: Typed> $name<T> {
            /// Query for a single leaf.
            pub fn leaf(path: Path, view: View) -> Self {
                Self::from_spec(QuerySpec::new(path, true, view))
            }

            /// Query for a container (or list) subtree.
            pub fn container(path: Path, view: View) -> Self {
                Self::from_spec(QuerySpec::new(path, false, view))
            }

            fn from_spec(spec: QuerySpec) -> Self {
                Self {
                    spec: Arc::new(spec),
                    _payload: PhantomData,
                }
            }

            /// Replace the subscription paths (default: the query path).
            pub fn subscribing_to(self, paths: Vec<Path>) -> Self {
                let mut spec = (*self.spec).clone();
                spec.subscribe = paths;
                Self::from_spec(spec)
            }

            /// Derive the value through a functional translator.
            ///
            /// Only leaf queries accept a translator.
            pub fn with_translator(self, translator: Arc<dyn Translator>) -> Result<Self, UsageError> {
                if !self.spec.leaf {
                    return Err(UsageError::TranslatorOnContainer);
                }
                let mut spec = (*self.spec).clone();
                spec.translator = Some(translator);
                Ok(Self::from_spec(spec))
            }

            /// Target path.
            pub fn path(&self) -> &Path {
                &self.spec.path
            }

            /// Paths a subscription will request.
            pub fn subscribe_paths(&self) -> &[Path] {
                &self.spec.subscribe
            }

            /// True for leaf queries.
            pub fn is_leaf(&self) -> bool {
                self.spec.leaf
            }

            /// State or config view.
            pub fn view(&self) -> View {
                self.spec.view
            }

            pub(crate) fn spec(&self) -> &QuerySpec {
                &self.spec
            }
        }
    };
}

/// Query resolving to exactly one value.
pub struct SingletonQuery<T> {
    spec: Arc<QuerySpec>,
    _payload: PhantomData<fn() -> T>,
}

/// Query whose path contains wildcards, resolving to zero or more values.
pub struct WildcardQuery<T> {
    spec: Arc<QuerySpec>,
    _payload: PhantomData<fn() -> T>,
}

query_common!(SingletonQuery);
query_common!(WildcardQuery);

impl<T: Typed> SingletonQuery<T> {
    /// Decode this query's value from an accumulator.
    pub fn decode(&self, acc: &Accumulator) -> Result<Value<T>, ClientError> {
        let path = self.spec.path.clone();
        let ex = if self.spec.leaf {
            acc.extract_leaf::<T>(&path)?
        } else {
            acc.extract::<T>(&path, self.spec.view)
        };
        Ok(into_value(path, ex))
    }
}

impl<T: Typed> WildcardQuery<T> {
    /// Mark the matched list as `ordered-by user`: results keep arrival order.
    pub fn ordered(self) -> Self {
        let mut spec = (*self.spec).clone();
        spec.ordered = true;
        Self::from_spec(spec)
    }

    /// Decode every present match.
    pub fn decode_all(&self, acc: &Accumulator) -> Vec<Value<T>> {
        acc.extract_all::<T>(&self.spec.path, self.spec.view, self.spec.leaf, self.spec.ordered)
            .into_iter()
            .map(|(path, ex)| into_value(path, ex))
            .collect()
    }

    /// Decode one concrete match (absent when deleted or undecodable).
    pub fn decode_element(&self, acc: &Accumulator, path: &Path) -> Value<T> {
        match acc.extract_element::<T>(path, self.spec.view, self.spec.leaf) {
            Ok(ex) => into_value(path.clone(), ex),
            Err(_) => Value::absent(path.clone()),
        }
    }

    /// Concrete element path containing `changed`, or every known element
    /// when `changed` is an ancestor of the pattern.
    pub(crate) fn elements_for(&self, changed: &Path, known: &[Path]) -> Vec<Path> {
        let depth = self.spec.path.len();
        if changed.len() >= depth {
            let element = changed.truncated(depth);
            if element.matches(&self.spec.path) {
                return vec![element];
            }
            return Vec::new();
        }
        known
            .iter()
            .filter(|k| changed.is_prefix_of(k))
            .cloned()
            .collect()
    }
}

fn check_descendants(root: &Path, paths: &[Path]) -> Result<(), UsageError> {
    match paths.iter().find(|p| !root.is_prefix_of(p)) {
        Some(path) => Err(UsageError::NotAPrefix {
            root: root.clone(),
            path: path.clone(),
        }),
        None => Ok(()),
    }
}

/// Several descendant paths decoded into one root container.
///
/// The subscription covers only the added paths. [`query`](Self::query)
/// returns a snapshot; later additions do not alter it.
#[derive(Debug, Clone)]
pub struct Batch<T> {
    root: SingletonQuery<T>,
    paths: Vec<Path>,
}

impl<T: Typed> Batch<T> {
    /// Start a batch rooted at a container query.
    pub fn new(root: SingletonQuery<T>) -> Self {
        Self {
            root,
            paths: Vec::new(),
        }
    }

    /// Add descendant paths. Every path must lie under the root.
    pub fn add_paths(&mut self, paths: impl IntoIterator<Item = Path>) -> Result<&mut Self, UsageError> {
        let paths: Vec<Path> = paths.into_iter().collect();
        check_descendants(self.root.path(), &paths)?;
        self.paths.extend(paths);
        Ok(self)
    }

    /// Snapshot query over the root and the paths added so far.
    pub fn query(&self) -> SingletonQuery<T> {
        let subscribe = if self.paths.is_empty() {
            vec![self.root.path().clone()]
        } else {
            self.paths.clone()
        };
        self.root.clone().subscribing_to(subscribe)
    }
}

/// A [`Batch`] whose root is a wildcard query.
#[derive(Debug, Clone)]
pub struct WildcardBatch<T> {
    root: WildcardQuery<T>,
    paths: Vec<Path>,
}

impl<T: Typed> WildcardBatch<T> {
    /// Start a batch rooted at a wildcard container query.
    pub fn new(root: WildcardQuery<T>) -> Self {
        Self {
            root,
            paths: Vec::new(),
        }
    }

    /// Add descendant paths. Every path must lie under the root.
    pub fn add_paths(&mut self, paths: impl IntoIterator<Item = Path>) -> Result<&mut Self, UsageError> {
        let paths: Vec<Path> = paths.into_iter().collect();
        check_descendants(self.root.path(), &paths)?;
        self.paths.extend(paths);
        Ok(self)
    }

    /// Snapshot query over the root and the paths added so far.
    pub fn query(&self) -> WildcardQuery<T> {
        let subscribe = if self.paths.is_empty() {
            vec![self.root.path().clone()]
        } else {
            self.paths.clone()
        };
        self.root.clone().subscribing_to(subscribe)
    }
}
