//! Integration tests for progress and effort rollups across deep trees.
//!
//! Percent complete on a branch is the floor of done leaves over total
//! leaves across its whole subtree, and effort totals on a branch are the
//! sum of its direct children. Both must hold after any mix of edits,
//! structure changes, and done transitions.

use capstan::models::WorkField;
use capstan::tree::NodeId;
use capstan::workspace::Workspace;
use chrono::{DateTime, TimeZone, Utc};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 20, 10, 0, 0).unwrap()
}

fn titled(ws: &mut Workspace, parent: Option<NodeId>, after: Option<NodeId>, title: &str) -> NodeId {
    let node = ws.add_task(parent, after);
    ws.commit_title(node, title, t0());
    node
}

/// root
/// ├── alpha
/// │   ├── a1
/// │   └── a2
/// └── beta
struct Fixture {
    ws: Workspace,
    root: NodeId,
    alpha: NodeId,
    a1: NodeId,
    a2: NodeId,
    beta: NodeId,
}

fn fixture() -> Fixture {
    let mut ws = Workspace::new();
    let root = titled(&mut ws, None, None, "root");
    let alpha = titled(&mut ws, Some(root), None, "alpha");
    let a1 = titled(&mut ws, Some(alpha), None, "a1");
    let a2 = titled(&mut ws, Some(alpha), Some(a1), "a2");
    let beta = titled(&mut ws, Some(root), Some(alpha), "beta");
    Fixture {
        ws,
        root,
        alpha,
        a1,
        a2,
        beta,
    }
}

#[test]
fn test_percent_counts_leaves_not_children() {
    let mut f = fixture();
    f.ws.commit_done(f.a1, t0());

    // Three leaves (a1, a2, beta), one done. A child-averaging scheme would
    // say 25 here; leaf counting says 33.
    assert_eq!(f.ws.task(f.alpha).percent_complete, 50);
    assert_eq!(f.ws.task(f.root).percent_complete, 33);

    f.ws.commit_done(f.beta, t0());
    assert_eq!(f.ws.task(f.root).percent_complete, 66);

    f.ws.commit_done(f.a2, t0());
    assert_eq!(f.ws.task(f.root).percent_complete, 100);
    assert!(!f.ws.task(f.root).done); // percent alone never sets the flag
}

#[test]
fn test_marking_branch_done_completes_subtree() {
    let mut f = fixture();
    f.ws.commit_done(f.alpha, t0());
    assert_eq!(f.ws.task(f.alpha).percent_complete, 100);
    assert!(f.ws.task(f.a1).done && f.ws.task(f.a2).done);
    assert_eq!(f.ws.task(f.root).percent_complete, 66);
}

#[test]
fn test_effort_sums_direct_children() {
    let mut f = fixture();
    f.ws.commit_est(f.a1, 1.0);
    f.ws.commit_est(f.a2, 2.0);
    f.ws.commit_est(f.beta, 0.5);

    assert_eq!(f.ws.task(f.alpha).estimated_seconds, 10800);
    assert_eq!(f.ws.task(f.root).estimated_seconds, 12600);
}

#[test]
fn test_branch_override_then_derive() {
    let mut f = fixture();
    f.ws.commit_est(f.a1, 1.0);
    f.ws.commit_est(f.a2, 2.0);

    // A manual branch estimate replaces the derived sum and the delta
    // flows upward.
    f.ws.commit_est(f.alpha, 10.0);
    assert_eq!(f.ws.task(f.alpha).estimated_seconds, 36000);
    assert_eq!(f.ws.task(f.root).estimated_seconds, 36000);

    // Deriving puts the child sum back.
    f.ws.derive_est(f.alpha);
    assert_eq!(f.ws.task(f.alpha).estimated_seconds, 10800);
    assert_eq!(f.ws.task(f.root).estimated_seconds, 10800);
}

#[test]
fn test_fractional_hours_truncate_to_seconds() {
    let mut f = fixture();
    f.ws.commit_spent(f.beta, 0.9999);
    assert_eq!(f.ws.task(f.beta).spent_seconds, 3599);
    assert_eq!(
        WorkField::Spent.get(f.ws.task(f.root)),
        3599
    );
}

#[test]
fn test_removal_keeps_ancestor_totals_consistent() {
    let mut f = fixture();
    f.ws.commit_est(f.a1, 1.0);
    f.ws.commit_est(f.a2, 2.0);
    f.ws.commit_est(f.beta, 4.0);

    f.ws.delete_tasks(&[f.alpha], t0());
    assert_eq!(f.ws.task(f.root).estimated_seconds, 14400);
    assert_eq!(f.ws.tree().children_of(f.root).len(), 1);
}

#[test]
fn test_removal_recomputes_percent() {
    let mut f = fixture();
    f.ws.commit_done(f.a1, t0());
    f.ws.commit_done(f.a2, t0());
    assert_eq!(f.ws.task(f.root).percent_complete, 66);

    // Dropping the finished branch leaves only the unfinished leaf.
    f.ws.delete_tasks(&[f.alpha], t0());
    assert_eq!(f.ws.task(f.root).percent_complete, 0);
}

#[test]
fn test_reopening_leaf_reopens_ancestors() {
    let mut f = fixture();
    f.ws.commit_done(f.root, t0());
    assert!(f.ws.task(f.root).done);

    f.ws.commit_done(f.a1, t0()); // toggle back to open
    assert!(!f.ws.task(f.a1).done);
    assert!(!f.ws.task(f.alpha).done);
    assert!(!f.ws.task(f.root).done);
    // The sibling leaf keeps its forced completion.
    assert!(f.ws.task(f.a2).done);
    assert_eq!(f.ws.task(f.root).percent_complete, 66);
}
