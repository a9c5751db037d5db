//! Rollup aggregation: percent-complete and effort totals.
//!
//! Percent complete is derived by recursive leaf counting: a branch is
//! `floor(100 * done_leaves / total_leaves)` over all descendant leaves, and
//! a leaf is 0 or 100 per its own done flag. Effort fields roll up as plain
//! sums of direct children, maintained incrementally - a leaf edit
//! propagates its signed delta through every ancestor in one pass rather
//! than re-summing subtrees.
//!
//! All walks here are read-only over the structure; field writes happen as
//! each node's read completes. Nothing in this module inserts or removes
//! nodes.

use tracing::trace;

use crate::models::WorkField;
use crate::tree::{NodeId, TaskTree};

/// Leaf tally for a subtree, returned so a caller (typically the parent's
/// recomputation) can reuse it without a second walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafCounts {
    /// Leaves (childless nodes) in the subtree.
    pub total: u64,
    /// Leaves currently marked done.
    pub done: u64,
}

/// Recompute `percent_complete` on `node` and every descendant.
///
/// A childless node is forced to 0, or 100 when it is itself done. A branch
/// gets `floor(100 * done / total)` over its descendant leaves; branch
/// descendants contribute their leaf tallies, not a single unit.
pub fn recompute_percent(tree: &mut TaskTree, node: NodeId) -> LeafCounts {
    let children: Vec<NodeId> = tree.children_of(node).to_vec();
    if children.is_empty() {
        let task = tree.get_mut(node);
        task.percent_complete = if task.done { 100 } else { 0 };
        return LeafCounts {
            total: 1,
            done: task.done as u64,
        };
    }

    let mut counts = LeafCounts { total: 0, done: 0 };
    for child in children {
        let child_counts = recompute_percent(tree, child);
        counts.total += child_counts.total;
        counts.done += child_counts.done;
    }
    // A branch always has at least one descendant leaf.
    tree.get_mut(node).percent_complete = (counts.done * 100 / counts.total) as u8;
    counts
}

/// Recompute percent on `node`'s parent only - a single level, never
/// recursive to the root.
///
/// After a leaf edit or a done cascade only the immediate parent's subtree
/// is stale; callers needing full-ancestor consistency call this repeatedly
/// up the chain. No-op for roots.
pub fn recompute_parent_percent(tree: &mut TaskTree, node: NodeId) {
    if let Some(parent) = tree.parent_of(node) {
        recompute_percent(tree, parent);
    }
}

/// Commit an hours-denominated effort edit.
///
/// Rejects non-finite or negative input with `None` and no state change.
/// Accepted input is truncated toward zero at the second boundary
/// (`floor(hours * 3600)`), written to `node`, and the signed delta is
/// applied to the same field on every ancestor. Returns the field's
/// previous value for undo recording.
pub fn commit_work(
    tree: &mut TaskTree,
    node: NodeId,
    field: WorkField,
    hours: f64,
) -> Option<u64> {
    if !hours.is_finite() || hours < 0.0 {
        return None;
    }
    let seconds = (hours * 3600.0).floor() as u64;
    Some(commit_work_seconds(tree, node, field, seconds))
}

/// Commit an exact seconds value through the same delta-propagation path as
/// [`commit_work`]. Used by undo replay and tracking stop, where converting
/// through hours would lose precision. Returns the previous value.
pub fn commit_work_seconds(tree: &mut TaskTree, node: NodeId, field: WorkField, seconds: u64) -> u64 {
    let task = tree.get_mut(node);
    let previous = field.get(task);
    field.set(task, seconds);

    let delta = seconds as i64 - previous as i64;
    if delta != 0 {
        propagate_delta(tree, node, field, delta);
    }
    trace!(node = %node, field = %field, previous, seconds, "work committed");
    previous
}

/// Recompute `field` on `node` from its direct children's values only.
///
/// Non-recursive by design: callers resetting a whole subtree derive
/// children first, bottom-up. The new total is written through the
/// delta-propagation path so ancestors stay consistent. Returns the
/// previous value.
pub fn derive_work(tree: &mut TaskTree, node: NodeId, field: WorkField) -> u64 {
    let total: u64 = tree
        .children_of(node)
        .to_vec()
        .iter()
        .map(|&child| field.get(tree.get(child)))
        .sum();
    commit_work_seconds(tree, node, field, total)
}

/// After attaching a subtree whose own totals are internally consistent
/// (a paste or a delete-undo restore), add its root totals to every
/// ancestor's corresponding field.
pub fn absorb_subtree(tree: &mut TaskTree, node: NodeId) {
    for field in [WorkField::Estimated, WorkField::Spent] {
        let value = field.get(tree.get(node)) as i64;
        if value != 0 {
            propagate_delta(tree, node, field, value);
        }
    }
}

fn propagate_delta(tree: &mut TaskTree, node: NodeId, field: WorkField, mut delta: i64) {
    let mut current = tree.parent_of(node);
    while let Some(ancestor) = current {
        if delta == 0 {
            break;
        }
        let task = tree.get_mut(ancestor);
        let previous = field.get(task) as i64;
        // A manual branch override can sit below its children's sum, so a
        // shrinking child may carry more negative delta than the ancestor
        // holds. Clamp at zero and pass the applied change upward, keeping
        // higher ancestors consistent with what this one actually did.
        let next = (previous + delta).max(0);
        field.set(task, next as u64);
        delta = next - previous;
        current = tree.parent_of(ancestor);
    }
}
