//! Integration tests for undo/redo exactness.
//!
//! These drive a realistic editing session through the workspace and verify
//! that the history is a true mirror: undoing everything returns to the
//! empty document, and redoing everything reproduces the final state
//! byte-for-byte, including completion timestamps.

use capstan::models::{Task, TaskRecord};
use capstan::workspace::Workspace;
use chrono::{DateTime, Duration, TimeZone, Utc};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap()
}

fn forest(ws: &Workspace) -> Vec<TaskRecord> {
    ws.tree()
        .roots()
        .iter()
        .map(|&r| ws.tree().snapshot(r))
        .collect()
}

/// Build a session touching every operation kind, with deterministic clocks.
fn scripted_session() -> Workspace {
    let mut ws = Workspace::new();

    let release = ws.add_task(None, None);
    ws.commit_title(release, "release 2.0", t0());
    ws.commit_priority(release, "3");
    ws.commit_assigner(release, "bo");

    let docs = ws.add_task(Some(release), None);
    ws.commit_title(docs, "update docs", t0());
    ws.commit_est(docs, 2.5);

    let tests = ws.add_task(Some(release), Some(docs));
    ws.commit_title(tests, "run test suite", t0());
    ws.commit_notes(tests, "needs the staging cluster");
    ws.commit_due(tests, Some(t0() + Duration::days(7)), true);

    ws.start_tracking(tests, t0() + Duration::hours(1));
    ws.stop_tracking(t0() + Duration::hours(2));

    ws.commit_done(docs, t0() + Duration::hours(3));

    let scratch = ws.add_task(None, Some(release));
    ws.commit_title(scratch, "triage inbox", t0());
    ws.delete_tasks(&[scratch], t0() + Duration::hours(4));

    let imported = TaskRecord::leaf(Task {
        title: "imported item".to_string(),
        estimated_seconds: 1800,
        ..Task::default()
    });
    ws.paste(&[imported], Some(release), Some(tests));

    ws
}

#[test]
fn test_undo_everything_returns_to_empty() {
    let mut ws = scripted_session();
    while ws.undo().is_some() {}
    assert!(ws.tree().is_empty());
    assert!(!ws.can_undo());
    assert!(ws.can_redo());
}

#[test]
fn test_redo_everything_reproduces_final_state() {
    let mut ws = scripted_session();
    let final_state = forest(&ws);
    let final_undo_len = ws.undo_len();

    while ws.undo().is_some() {}
    while ws.redo().is_some() {}

    assert_eq!(forest(&ws), final_state);
    assert_eq!(ws.undo_len(), final_undo_len);
    assert!(!ws.can_redo());
}

#[test]
fn test_undo_redo_cycle_is_stable() {
    // Three full cycles must not drift.
    let mut ws = scripted_session();
    let final_state = forest(&ws);
    for _ in 0..3 {
        while ws.undo().is_some() {}
        while ws.redo().is_some() {}
    }
    assert_eq!(forest(&ws), final_state);
}

#[test]
fn test_partial_undo_then_new_edit_forks() {
    let mut ws = scripted_session();
    ws.undo();
    ws.undo();
    assert!(ws.can_redo());

    let root = ws.tree().roots()[0];
    ws.commit_notes(root, "fresh direction");
    assert!(!ws.can_redo());

    // The fork is itself undoable.
    ws.undo();
    assert_eq!(ws.task(root).notes, "");
}

#[test]
fn test_completion_stamps_survive_replay() {
    let mut ws = scripted_session();
    let release = ws.tree().roots()[0];
    let docs = ws.tree().children_of(release)[0];
    let stamp = ws.task(docs).completed_at.expect("docs was completed");

    while ws.undo().is_some() {}
    while ws.redo().is_some() {}

    let release = ws.tree().roots()[0];
    let docs = ws.tree().children_of(release)[0];
    assert_eq!(ws.task(docs).completed_at, Some(stamp));
}

#[test]
fn test_rollups_consistent_after_replay() {
    let mut ws = scripted_session();
    while ws.undo().is_some() {}
    while ws.redo().is_some() {}

    let release = ws.tree().roots()[0];
    // docs 9000 est + imported 1800 est; tests tracked for one hour.
    assert_eq!(ws.task(release).estimated_seconds, 10800);
    assert_eq!(ws.task(release).spent_seconds, 3600);
    // One of three children done.
    assert_eq!(ws.task(release).percent_complete, 33);
}
