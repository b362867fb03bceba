// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Notification accumulator.
//!
//! Partial, possibly reordered updates and deletes are folded into a tree
//! keyed by path element. Every node remembers the latest value stored at its
//! exact path, its children in first-seen order, the newest timestamp that
//! touched it, and the timestamp of the last delete of its subtree.
//!
//! Invariants:
//! - a stored value is the one with the greatest timestamp for that path;
//!   updates older than it, or older than a delete of the path or an
//!   ancestor, are dropped;
//! - a delete removes everything at or below its path that is not newer
//!   than the delete, and a removed list element leaves the order record;
//! - extraction never mutates the tree.

use std::time::SystemTime;

use indexmap::IndexMap;
use tracing::trace;
use ytel_proto::{Notification, Path, PathElem, TypedValue};

use crate::error::DecodeError;
use crate::schema::{FieldOutcome, Typed, View};
use crate::value::ComplianceErrors;

/// One concrete update, ready to be accumulated.
#[derive(Debug, Clone, PartialEq)]
pub struct Datapoint {
    /// Absolute path.
    pub path: Path,
    /// Wire value.
    pub value: TypedValue,
    /// Notification timestamp (ns since the epoch).
    pub timestamp: i64,
    /// Local receipt time.
    pub recv_timestamp: SystemTime,
}

/// A notification flattened onto absolute paths.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Resolved {
    pub(crate) timestamp: i64,
    pub(crate) recv: SystemTime,
    /// Subtree replaced by an atomic notification.
    pub(crate) clear: Option<Path>,
    pub(crate) deletes: Vec<Path>,
    pub(crate) updates: Vec<(Path, TypedValue)>,
}

impl Resolved {
    /// Fails, with nothing resolved, when any update lacks a value. An
    /// empty prefix never clears the whole tree.
    pub(crate) fn from_notification(n: &Notification, recv: SystemTime) -> Result<Self, DecodeError> {
        let prefix = n.prefix.clone().unwrap_or_default();
        let updates = n
            .update
            .iter()
            .map(|u| {
                let path = prefix.concat(&u.path);
                match &u.val {
                    Some(v) => Ok((path, v.clone())),
                    None => Err(DecodeError::NilValue { path }),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        let deletes = n.delete.iter().map(|d| prefix.concat(d)).collect();
        Ok(Self {
            timestamp: n.timestamp,
            recv,
            clear: (n.atomic && !prefix.is_empty()).then_some(prefix),
            deletes,
            updates,
        })
    }
}

/// Where one resolved update goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Admit {
    /// Store it, with the validator's rejection if any.
    Store(Option<String>),
    /// Keep it aside as a stray.
    Stray,
}

#[derive(Debug, Clone)]
struct Stored {
    value: TypedValue,
    timestamp: i64,
    recv: SystemTime,
    cycle: u64,
    writes: u32,
    rejection: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct Node {
    stored: Option<Stored>,
    children: IndexMap<PathElem, Node>,
    touched: Option<i64>,
    cleared_at: Option<i64>,
}

fn max_opt(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

impl Node {
    fn is_vacant(&self) -> bool {
        self.stored.is_none() && self.children.values().all(Node::is_vacant)
    }

    fn stale(&self, timestamp: i64) -> bool {
        self.cleared_at.is_some_and(|c| c > timestamp)
    }

    fn touch(&mut self, timestamp: i64) {
        self.touched = max_opt(self.touched, Some(timestamp));
    }

    /// Newest timestamp anywhere in this subtree.
    fn subtree_stamp(&self) -> Option<i64> {
        self.children
            .values()
            .fold(self.touched, |acc, c| max_opt(acc, c.subtree_stamp()))
    }

    /// Drop everything not newer than `timestamp`. Vacant children are
    /// removed so that a reappearing list element goes to the back, unless
    /// they still hold a delete newer than this one.
    fn prune(&mut self, timestamp: i64) {
        if self.stored.as_ref().is_some_and(|s| s.timestamp <= timestamp) {
            self.stored = None;
        }
        for child in self.children.values_mut() {
            child.prune(timestamp);
        }
        self.children
            .retain(|_, c| c.stored.is_some() || !c.children.is_empty() || c.stale(timestamp));
    }

    /// Depth-first walk in insertion order, `f(relative path, stored)`.
    fn walk<'a>(&'a self, rel: &mut Vec<PathElem>, f: &mut dyn FnMut(&[PathElem], &'a Stored)) {
        if let Some(stored) = &self.stored {
            f(rel, stored);
        }
        for (elem, child) in &self.children {
            rel.push(elem.clone());
            child.walk(rel, f);
            rel.pop();
        }
    }

    fn collect_matches(&self, pattern: &[PathElem], here: &mut Path, out: &mut Vec<Path>) {
        let Some((head, tail)) = pattern.split_first() else {
            if !self.is_vacant() {
                out.push(here.clone());
            }
            return;
        };
        for (elem, child) in &self.children {
            if elem.matches(head) {
                here.push(elem.clone());
                child.collect_matches(tail, here, out);
                here.pop();
            }
        }
    }
}

/// Decoded result of one extraction.
#[derive(Debug, Clone)]
pub struct Extracted<T> {
    /// Typed payload; `None` when nothing decoded.
    pub value: Option<T>,
    /// Newest update or delete timestamp relevant to the target.
    pub timestamp: Option<i64>,
    /// Receipt time of the newest contributing datapoint.
    pub recv_timestamp: Option<SystemTime>,
    /// Non-fatal decode problems.
    pub compliance: ComplianceErrors,
}

impl<T> Extracted<T> {
    fn empty(timestamp: Option<i64>) -> Self {
        Self {
            value: None,
            timestamp,
            recv_timestamp: None,
            compliance: ComplianceErrors::default(),
        }
    }
}

fn note_recv(slot: &mut Option<SystemTime>, recv: SystemTime) {
    if slot.map_or(true, |cur| cur < recv) {
        *slot = Some(recv);
    }
}

/// Path-keyed tree of accumulated telemetry.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    root: Node,
    cycle: u64,
    strays: Vec<Datapoint>,
    changed: Vec<Path>,
}

impl Accumulator {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.root.is_vacant()
    }

    /// Start a new poll cycle: duplicate-write counts, strays and the
    /// changed-path log all reset.
    pub fn begin_cycle(&mut self) {
        self.cycle += 1;
        self.strays.clear();
        self.changed.clear();
    }

    /// Store `value` at `path`, received now. Returns false for stale updates.
    pub fn apply_update(&mut self, path: &Path, value: TypedValue, timestamp: i64) -> bool {
        self.apply(
            Datapoint {
                path: path.clone(),
                value,
                timestamp,
                recv_timestamp: SystemTime::now(),
            },
            None,
        )
    }

    /// Store a datapoint, optionally tagged with a validator rejection.
    pub fn apply(&mut self, dp: Datapoint, rejection: Option<String>) -> bool {
        let cycle = self.cycle;
        let mut node = &mut self.root;
        if node.stale(dp.timestamp) {
            trace!(path = %dp.path, "dropping update older than a delete");
            return false;
        }
        for elem in dp.path.elems() {
            if node.children.get(elem).is_some_and(Node::is_vacant) {
                if let Some(revived) = node.children.shift_remove(elem) {
                    node.children.insert(elem.clone(), revived);
                }
            }
            node = node.children.entry(elem.clone()).or_default();
            if node.stale(dp.timestamp) {
                trace!(path = %dp.path, "dropping update older than a delete");
                return false;
            }
        }
        let writes = match &node.stored {
            Some(old) if old.timestamp > dp.timestamp => {
                trace!(path = %dp.path, "dropping update older than stored value");
                return false;
            }
            Some(old) if old.cycle == cycle => {
                if old.value == dp.value && old.timestamp == dp.timestamp {
                    old.writes
                } else {
                    old.writes + 1
                }
            }
            _ => 1,
        };
        node.stored = Some(Stored {
            value: dp.value,
            timestamp: dp.timestamp,
            recv: dp.recv_timestamp,
            cycle,
            writes,
            rejection,
        });
        node.touch(dp.timestamp);
        self.changed.push(dp.path);
        true
    }

    /// Remove the subtree at `path`. Wildcard paths delete every match.
    pub fn apply_delete(&mut self, path: &Path, timestamp: i64) {
        if path.has_wildcards() {
            for concrete in self.matching(path) {
                self.apply_delete(&concrete, timestamp);
            }
            return;
        }
        let mut node = &mut self.root;
        for elem in path.elems() {
            node = node.children.entry(elem.clone()).or_default();
        }
        node.prune(timestamp);
        node.cleared_at = max_opt(node.cleared_at, Some(timestamp));
        node.touch(timestamp);
        self.changed.push(path.clone());
    }

    /// Apply a resolved notification as one unit: the atomic clear, then
    /// deletes, then each update as `admit` decides.
    pub(crate) fn apply_resolved(&mut self, resolved: Resolved, mut admit: impl FnMut(&Datapoint) -> Admit) {
        let Resolved {
            timestamp,
            recv,
            clear,
            deletes,
            updates,
        } = resolved;
        if let Some(prefix) = &clear {
            self.apply_delete(prefix, timestamp);
        }
        for path in &deletes {
            self.apply_delete(path, timestamp);
        }
        for (path, value) in updates {
            let dp = Datapoint {
                path,
                value,
                timestamp,
                recv_timestamp: recv,
            };
            match admit(&dp) {
                Admit::Store(rejection) => {
                    self.apply(dp, rejection);
                }
                Admit::Stray => self.record_stray(dp),
            }
        }
    }

    /// Remember an update that fell outside every subscribed path.
    pub fn record_stray(&mut self, dp: Datapoint) {
        self.strays.push(dp);
    }

    /// Strays recorded this cycle.
    pub fn strays(&self) -> &[Datapoint] {
        &self.strays
    }

    /// Paths updated or deleted this cycle, in arrival order.
    pub fn changed_paths(&self) -> &[Path] {
        &self.changed
    }

    /// True when this cycle touched `path`, something below it, or an ancestor.
    pub fn changed_under(&self, path: &Path) -> bool {
        self.changed
            .iter()
            .any(|c| path.is_prefix_of(c) || c.is_prefix_of(path))
    }

    /// Concrete, non-empty paths matching `pattern`, in first-seen order.
    pub fn matching(&self, pattern: &Path) -> Vec<Path> {
        let mut out = Vec::new();
        let mut here = Path::root();
        self.root.collect_matches(pattern.elems(), &mut here, &mut out);
        out
    }

    fn locate(&self, target: &Path) -> (Option<&Node>, Option<i64>) {
        let mut node = &self.root;
        let mut inherited = node.cleared_at;
        for elem in target.elems() {
            match node.children.get(elem) {
                Some(child) => {
                    node = child;
                    inherited = max_opt(inherited, child.cleared_at);
                }
                None => return (None, inherited),
            }
        }
        (Some(node), inherited)
    }

    /// Reconstruct a container (or any non-leaf value) at `target`.
    ///
    /// Every stored datapoint under `target` is offered to `T`; failures are
    /// recorded as compliance errors and the rest still decode. Strays of
    /// the current cycle are reported as path errors.
    pub fn extract<T: Typed>(&self, target: &Path, view: View) -> Extracted<T> {
        let mut out = self.extract_subtree::<T>(target, view);
        for stray in &self.strays {
            out.compliance.record(
                stray.path.clone(),
                &stray.value,
                crate::schema::FieldError::UnknownPath {
                    path: stray.path.clone(),
                },
            );
        }
        out
    }

    fn extract_subtree<T: Typed>(&self, target: &Path, view: View) -> Extracted<T> {
        let (node, inherited) = self.locate(target);
        let Some(node) = node else {
            return Extracted::empty(inherited);
        };
        let mut out = Extracted::empty(max_opt(inherited, node.subtree_stamp()));
        let mut decoded = T::default();
        let mut present = false;
        let mut rel = Vec::new();
        node.walk(&mut rel, &mut |rel, stored| {
            note_recv(&mut out.recv_timestamp, stored.recv);
            if let Some(msg) = &stored.rejection {
                out.compliance.validate_errors.push(msg.clone());
            }
            match decoded.decode_field(rel, &stored.value, view) {
                Ok(FieldOutcome::Applied) => present = true,
                Ok(FieldOutcome::Ignored) => {}
                Err(err) => {
                    let abs = target.concat(&Path::from_elems(rel.iter().cloned()));
                    out.compliance.record(abs, &stored.value, err);
                }
            }
        });
        out.value = present.then_some(decoded);
        out
    }

    /// Reconstruct the single leaf at `target`.
    ///
    /// Fails when the cycle delivered updates outside the query, when data
    /// exists below the leaf, or when more than one distinct update for the
    /// leaf landed in the current cycle.
    pub fn extract_leaf<T: Typed>(&self, target: &Path) -> Result<Extracted<T>, DecodeError> {
        if let Some(stray) = self.strays.first() {
            return Err(DecodeError::Noncompliant {
                path: target.clone(),
                detail: format!("update at unexpected path {}", stray.path),
            });
        }
        self.leaf_at(target)
    }

    fn leaf_at<T: Typed>(&self, target: &Path) -> Result<Extracted<T>, DecodeError> {
        let (node, inherited) = self.locate(target);
        let Some(node) = node else {
            return Ok(Extracted::empty(inherited));
        };
        if let Some((elem, _)) = node.children.iter().find(|(_, c)| !c.is_vacant()) {
            return Err(DecodeError::Noncompliant {
                path: target.clone(),
                detail: format!("data below leaf at {}", target.child(elem.clone())),
            });
        }
        let mut out = Extracted::empty(max_opt(inherited, node.subtree_stamp()));
        let Some(stored) = &node.stored else {
            return Ok(out);
        };
        if stored.cycle == self.cycle && stored.writes > 1 {
            return Err(DecodeError::Noncompliant {
                path: target.clone(),
                detail: format!("{} distinct updates in one cycle", stored.writes),
            });
        }
        let mut leaf = T::default();
        leaf.decode_field(&[], &stored.value, View::State)
            .map_err(|source| DecodeError::Unmarshal {
                path: target.clone(),
                source,
            })?;
        out.value = Some(leaf);
        out.recv_timestamp = Some(stored.recv);
        if let Some(msg) = &stored.rejection {
            out.compliance.validate_errors.push(msg.clone());
        }
        Ok(out)
    }

    /// Reconstruct one element at a concrete `path`, ignoring strays.
    ///
    /// Leaf decode failures yield `Err`, which wildcard callers skip.
    pub fn extract_element<T: Typed>(
        &self,
        path: &Path,
        view: View,
        leaf: bool,
    ) -> Result<Extracted<T>, DecodeError> {
        if leaf {
            self.leaf_at(path)
        } else {
            Ok(self.extract_subtree(path, view))
        }
    }

    /// Reconstruct every present element matching `pattern`.
    ///
    /// Elements come in ascending path order, or first-seen order when
    /// `ordered`. Leaf elements that fail to decode are skipped.
    pub fn extract_all<T: Typed>(
        &self,
        pattern: &Path,
        view: View,
        leaf: bool,
        ordered: bool,
    ) -> Vec<(Path, Extracted<T>)> {
        let mut paths = self.matching(pattern);
        if !ordered {
            paths.sort();
        }
        paths
            .into_iter()
            .filter_map(|path| match self.extract_element::<T>(&path, view, leaf) {
                Ok(ex) if ex.value.is_some() => Some((path, ex)),
                Ok(_) => None,
                Err(err) => {
                    trace!(%path, %err, "skipping element");
                    None
                }
            })
            .collect()
    }
}
