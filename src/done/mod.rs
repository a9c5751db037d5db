//! Cascading done/not-done transitions.
//!
//! Marking a task done forces its whole subtree done; marking it not-done
//! forces its whole ancestor chain not-done. Neither direction touches the
//! other: re-opening a task leaves previously-finished siblings and
//! children finished. Both transitions return a [`DoneCascade`] describing
//! exactly which flags flipped and which completion stamps were freshly
//! written, so the caller can record an invertible undo entry instead of
//! merely toggling the one node.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::WorkField;
use crate::rollup;
use crate::session::Session;
use crate::tree::{NodeId, TaskTree};

/// Elapsed time committed because a done cascade swallowed the tracked node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackStop {
    /// The node that was being tracked.
    pub node: NodeId,
    /// Its spent seconds before the commit.
    pub previous_seconds: u64,
    /// Its spent seconds after the commit.
    pub new_seconds: u64,
}

/// The observable effect of one done/not-done transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoneCascade {
    /// The node the transition was invoked on.
    pub node: NodeId,
    /// Its done flag before the transition.
    pub old_done: bool,
    /// Its done flag after the transition.
    pub new_done: bool,
    /// Other nodes whose done flag actually flipped: descendants for a
    /// mark-done, ancestors for a mark-not-done.
    pub flipped: Vec<NodeId>,
    /// Nodes (the target included) that received a fresh `completed_at`
    /// stamp. Nodes with an existing stamp keep it: first completion wins.
    pub stamped: Vec<NodeId>,
    /// The timestamp used for every stamp in this cascade.
    pub at: DateTime<Utc>,
    /// Set when the cascade had to stop time tracking first.
    pub track_stop: Option<TrackStop>,
}

/// Transition `node` to done, forcing every descendant done.
///
/// Descendants get `completed_at = at` only where unset; a tracked node
/// inside the subtree has its elapsed time committed (through the rollup
/// path) before its flag is forced. Always succeeds given a valid handle.
/// Finishes with a single-level parent percent recompute - callers needing
/// the full ancestor chain consistent extend it (see
/// [`crate::workspace::Workspace::commit_done`]).
pub fn mark_done(
    tree: &mut TaskTree,
    session: &mut Session,
    node: NodeId,
    at: DateTime<Utc>,
) -> DoneCascade {
    let track_stop = stop_tracking_in_subtree(tree, session, node, at);

    let old_done = tree.get(node).done;
    {
        let task = tree.get_mut(node);
        task.percent_complete = 100;
        task.done = true;
    }

    let mut flipped = Vec::new();
    let mut stamped = Vec::new();
    for descendant in tree.descendants(node) {
        let task = tree.get_mut(descendant);
        if !task.done {
            task.done = true;
            flipped.push(descendant);
        }
        task.percent_complete = 100;
        if task.completed_at.is_none() {
            task.completed_at = Some(at);
            stamped.push(descendant);
        }
    }

    let task = tree.get_mut(node);
    if task.completed_at.is_none() {
        task.completed_at = Some(at);
        stamped.push(node);
    }

    rollup::recompute_parent_percent(tree, node);
    debug!(node = %node, flipped = flipped.len(), "marked done");

    DoneCascade {
        node,
        old_done,
        new_done: true,
        flipped,
        stamped,
        at,
        track_stop,
    }
}

/// Transition `node` to not-done, forcing every ancestor not-done.
///
/// Descendant flags are untouched by design. The node's percent is reset
/// (0 for a leaf, recomputed from leaves for a branch), then the parent gets
/// a single-level recompute.
pub fn mark_not_done(tree: &mut TaskTree, node: NodeId, at: DateTime<Utc>) -> DoneCascade {
    let old_done = tree.get(node).done;
    tree.get_mut(node).done = false;

    let mut flipped = Vec::new();
    let mut current = tree.parent_of(node);
    while let Some(ancestor) = current {
        let task = tree.get_mut(ancestor);
        if task.done {
            task.done = false;
            flipped.push(ancestor);
        }
        current = tree.parent_of(ancestor);
    }

    if tree.is_leaf(node) {
        tree.get_mut(node).percent_complete = 0;
    } else {
        rollup::recompute_percent(tree, node);
    }
    rollup::recompute_parent_percent(tree, node);
    debug!(node = %node, flipped = flipped.len(), "marked not done");

    DoneCascade {
        node,
        old_done,
        new_done: false,
        flipped,
        stamped: Vec::new(),
        at,
        track_stop: None,
    }
}

/// Stop the session stopwatch if the tracked node sits inside `root`'s
/// subtree, committing the elapsed time as spent work.
fn stop_tracking_in_subtree(
    tree: &mut TaskTree,
    session: &mut Session,
    root: NodeId,
    now: DateTime<Utc>,
) -> Option<TrackStop> {
    let tracked = session.tracked()?;
    if !tree.is_in_subtree(tracked, root) {
        return None;
    }
    let (node, elapsed) = session.end_tracking(now)?;
    let new_seconds = tree.get(node).spent_seconds + elapsed;
    let previous_seconds = rollup::commit_work_seconds(tree, node, WorkField::Spent, new_seconds);
    tree.get_mut(node).tracking_active = false;
    Some(TrackStop {
        node,
        previous_seconds,
        new_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Task;
    use chrono::Duration;

    fn node(tree: &mut TaskTree, parent: Option<NodeId>) -> NodeId {
        let after = match parent {
            Some(p) => tree.children_of(p).last().copied(),
            None => tree.roots().last().copied(),
        };
        tree.insert(parent, after, Task::default())
    }

    #[test]
    fn test_mark_done_forces_subtree() {
        let mut tree = TaskTree::new();
        let mut session = Session::new();
        let root = node(&mut tree, None);
        let a = node(&mut tree, Some(root));
        let a1 = node(&mut tree, Some(a));
        let b = node(&mut tree, Some(root));

        let now = Utc::now();
        let cascade = mark_done(&mut tree, &mut session, root, now);

        for id in [root, a, a1, b] {
            assert!(tree.get(id).done);
            assert_eq!(tree.get(id).percent_complete, 100);
            assert_eq!(tree.get(id).completed_at, Some(now));
        }
        assert_eq!(cascade.flipped, vec![a, a1, b]);
        assert_eq!(cascade.stamped, vec![a, a1, b, root]);
        assert!(!cascade.old_done);
        assert!(cascade.new_done);
    }

    #[test]
    fn test_mark_done_first_completion_wins() {
        let mut tree = TaskTree::new();
        let mut session = Session::new();
        let root = node(&mut tree, None);
        let child = node(&mut tree, Some(root));

        let first = Utc::now();
        mark_done(&mut tree, &mut session, child, first);
        mark_not_done(&mut tree, child, first + Duration::seconds(5));

        // Re-marking done must not overwrite the original stamp.
        let later = first + Duration::seconds(60);
        let cascade = mark_done(&mut tree, &mut session, child, later);
        assert_eq!(tree.get(child).completed_at, Some(first));
        assert!(cascade.stamped.is_empty());
    }

    #[test]
    fn test_mark_done_already_done_descendants_do_not_flip() {
        let mut tree = TaskTree::new();
        let mut session = Session::new();
        let root = node(&mut tree, None);
        let a = node(&mut tree, Some(root));
        let b = node(&mut tree, Some(root));

        let earlier = Utc::now();
        mark_done(&mut tree, &mut session, a, earlier);

        let cascade = mark_done(&mut tree, &mut session, root, earlier + Duration::seconds(9));
        assert_eq!(cascade.flipped, vec![b]);
        // a keeps its original stamp
        assert_eq!(tree.get(a).completed_at, Some(earlier));
    }

    #[test]
    fn test_mark_not_done_forces_ancestors_only() {
        let mut tree = TaskTree::new();
        let mut session = Session::new();
        let root = node(&mut tree, None);
        let mid = node(&mut tree, Some(root));
        let leaf_a = node(&mut tree, Some(mid));
        let leaf_b = node(&mut tree, Some(mid));

        let now = Utc::now();
        mark_done(&mut tree, &mut session, root, now);

        let cascade = mark_not_done(&mut tree, leaf_a, now);
        assert!(!tree.get(leaf_a).done);
        assert!(!tree.get(mid).done);
        assert!(!tree.get(root).done);
        // Sibling leaf stays done: the downward cascade is one-directional.
        assert!(tree.get(leaf_b).done);
        assert_eq!(cascade.flipped, vec![mid, root]);

        assert_eq!(tree.get(leaf_a).percent_complete, 0);
        assert_eq!(tree.get(mid).percent_complete, 50);
    }

    #[test]
    fn test_done_then_not_done_restores_ancestors_not_descendants() {
        let mut tree = TaskTree::new();
        let mut session = Session::new();
        let root = node(&mut tree, None);
        let mid = node(&mut tree, Some(root));
        let inner = node(&mut tree, Some(mid));

        let now = Utc::now();
        mark_done(&mut tree, &mut session, mid, now);
        mark_not_done(&mut tree, mid, now);

        assert!(!tree.get(mid).done);
        assert!(!tree.get(root).done); // ancestor back to pre-markDone state
        assert!(tree.get(inner).done); // descendant stays forced
    }

    #[test]
    fn test_mark_not_done_branch_percent_recomputed() {
        let mut tree = TaskTree::new();
        let mut session = Session::new();
        let branch = node(&mut tree, None);
        node(&mut tree, Some(branch));
        node(&mut tree, Some(branch));

        let now = Utc::now();
        mark_done(&mut tree, &mut session, branch, now);
        assert_eq!(tree.get(branch).percent_complete, 100);

        mark_not_done(&mut tree, branch, now);
        // Both leaves were forced done by the cascade and stay done.
        assert_eq!(tree.get(branch).percent_complete, 100);
        assert!(!tree.get(branch).done);
    }

    #[test]
    fn test_mark_done_stops_tracked_descendant() {
        let mut tree = TaskTree::new();
        let mut session = Session::new();
        let root = node(&mut tree, None);
        let tracked = node(&mut tree, Some(root));

        let start = Utc::now();
        tree.get_mut(tracked).tracking_active = true;
        session.begin_tracking(tracked, start);

        let stop_at = start + Duration::seconds(120);
        let cascade = mark_done(&mut tree, &mut session, root, stop_at);

        let stop = cascade.track_stop.expect("tracking should have stopped");
        assert_eq!(stop.node, tracked);
        assert_eq!(stop.previous_seconds, 0);
        assert_eq!(stop.new_seconds, 120);
        assert!(!tree.get(tracked).tracking_active);
        assert!(!session.is_tracking());
        assert_eq!(tree.get(tracked).spent_seconds, 120);
        assert_eq!(tree.get(root).spent_seconds, 120);
    }

    #[test]
    fn test_mark_done_leaves_unrelated_tracking_alone() {
        let mut tree = TaskTree::new();
        let mut session = Session::new();
        let a = node(&mut tree, None);
        let b = node(&mut tree, None);

        tree.get_mut(b).tracking_active = true;
        session.begin_tracking(b, Utc::now());

        let cascade = mark_done(&mut tree, &mut session, a, Utc::now());
        assert!(cascade.track_stop.is_none());
        assert!(session.is_tracking());
        assert!(tree.get(b).tracking_active);
    }
}
