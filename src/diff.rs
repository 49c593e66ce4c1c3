//! Sparse diffing: given two renders of the same compiled template,
//! produces the minimal payload describing what changed. Unchanged
//! dynamics, and the static skeleton itself, are never retransmitted.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::template::{fingerprint, Dynamic, Leaf};

/// A diff result with no `"s"` arrays: only the dynamic slots whose
/// value actually changed between the two renders.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SparseTree(Vec<(String, SparseDynamic)>);

impl SparseTree {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SparseDynamic {
    Str(String),
    Tree(SparseTree),
    /// Emitted when an `if`/`with`/invoked branch's static skeleton
    /// changed between renders (e.g. an `if` flipped from its `else`
    /// branch to its `then` branch): the two sides have unrelated
    /// statics, so there is nothing to diff against and the client gets
    /// the full new leaf instead.
    FullLeaf(Leaf),
    /// Emitted when a range's item count changed: the client cannot
    /// reconcile positions, so it gets the full new list, statics and
    /// all.
    FullList(Vec<Leaf>),
    /// Emitted when a range's item count is unchanged: only the
    /// positions whose item actually differs, each diffed recursively.
    SparseList(Vec<(String, SparseTree)>),
}

impl Serialize for SparseTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Serialize for SparseDynamic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SparseDynamic::Str(s) => s.serialize(serializer),
            SparseDynamic::Tree(tree) => tree.serialize(serializer),
            SparseDynamic::FullLeaf(leaf) => leaf.serialize(serializer),
            SparseDynamic::FullList(items) => items.serialize(serializer),
            SparseDynamic::SparseList(items) => {
                let mut map = serializer.serialize_map(Some(items.len()))?;
                for (key, value) in items {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// Diffs two renders of the same compiled template. Both leaves must
/// have come from the same `Template::build` call site (the number and
/// kind of dynamics at each position is fixed by the template source,
/// never by data), so positions always line up; a branch whose
/// condition flipped between the two renders is handled as a full
/// replacement rather than a deeper diff, since its statics changed.
///
/// The two renders' structural fingerprints (spec.md §4.5/§4.6) are
/// compared up front. Per invariant #4, equal fingerprints mean the `"s"`
/// arrays match at every depth of both trees — no `if`/`with` branch
/// flipped and no range changed length anywhere — so the recursive walk
/// below can skip the per-node statics/length checks entirely and go
/// straight to comparing scalar values, the "values only" update the
/// fingerprint exists to enable.
pub fn diff(old: &Leaf, new: &Leaf) -> SparseTree {
    let same_skeleton = fingerprint(old) == fingerprint(new);
    diff_with_skeleton(old, new, same_skeleton)
}

fn diff_with_skeleton(old: &Leaf, new: &Leaf, same_skeleton: bool) -> SparseTree {
    let mut entries = Vec::new();
    for (i, (old_dynamic, new_dynamic)) in old.dynamics.iter().zip(new.dynamics.iter()).enumerate() {
        let key = i.to_string();
        match (old_dynamic, new_dynamic) {
            (Dynamic::Str(a), Dynamic::Str(b)) => {
                if a != b {
                    entries.push((key, SparseDynamic::Str(b.clone())));
                }
            }
            (Dynamic::Leaf(a), Dynamic::Leaf(b)) => {
                if !same_skeleton && a.statics != b.statics {
                    // A different branch rendered (e.g. `if`'s else vs.
                    // then side): the two skeletons are unrelated.
                    entries.push((key, SparseDynamic::FullLeaf((**b).clone())));
                } else {
                    let inner = diff_with_skeleton(a, b, same_skeleton);
                    if !inner.is_empty() {
                        entries.push((key, SparseDynamic::Tree(inner)));
                    }
                }
            }
            (Dynamic::List(a), Dynamic::List(b)) => {
                if same_skeleton || a.len() == b.len() {
                    let changed: Vec<(String, SparseTree)> = a
                        .iter()
                        .zip(b.iter())
                        .enumerate()
                        .filter_map(|(idx, (ai, bi))| {
                            let inner = diff_with_skeleton(ai, bi, same_skeleton);
                            (!inner.is_empty()).then(|| (idx.to_string(), inner))
                        })
                        .collect();
                    if !changed.is_empty() {
                        entries.push((key, SparseDynamic::SparseList(changed)));
                    }
                } else {
                    entries.push((key, SparseDynamic::FullList(b.clone())));
                }
            }
            _ => unreachable!(
                "dynamic kind mismatch at slot {key}: diff() requires both leaves to come \
                 from the same compiled template"
            ),
        }
    }
    SparseTree(entries)
}
