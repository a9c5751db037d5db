//! The orchestrating layer over tree, rollup, done-state, undo, and session.
//!
//! A [`Workspace`] owns one task tree plus everything document-scoped that
//! travels with it: the name registries, the creation defaults, the undo
//! log, the session (tracking stopwatch + selection), and the dirty flag.
//! Interactive callers go through the `commit_*` operations here; each one
//! validates its input, applies the mutation through the lower modules,
//! keeps rollups consistent along the full ancestor chain, and records an
//! invertible [`UndoRecord`]. Rejected input changes nothing and records
//! nothing.

use chrono::{DateTime, NaiveTime, Utc};
use tracing::{debug, warn};

use crate::document::{Document, ViewState, SCHEMA_VERSION};
use crate::done;
use crate::models::{NameRegistry, Task, TaskDefaults, TaskRecord, WorkField, MAX_PRIORITY};
use crate::rollup;
use crate::session::Session;
use crate::tree::{NodeId, TaskTree, TreePath};
use crate::undo::{FieldEdit, UndoLog, UndoRecord};

/// What a title commit did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleOutcome {
    /// The new title was written and recorded.
    Written,
    /// The edit was canceled; nothing changed. Blank input on a task that
    /// already has a title lands here on purpose.
    Canceled,
    /// Blank input on a never-titled task: the task was discarded.
    Discarded,
}

/// A task tree plus its document-scoped companions.
#[derive(Debug, Default)]
pub struct Workspace {
    tree: TaskTree,
    /// Deduplicated assigner names seen in this document.
    pub assigners: NameRegistry,
    /// Deduplicated assignee names seen in this document.
    pub assignees: NameRegistry,
    /// Deduplicated status labels seen in this document.
    pub statuses: NameRegistry,
    /// Defaults applied to new parentless tasks.
    pub defaults: TaskDefaults,
    undo: UndoLog,
    session: Session,
    dirty: bool,
}

impl Workspace {
    /// Create an empty workspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read access to the tree.
    pub fn tree(&self) -> &TaskTree {
        &self.tree
    }

    /// Shorthand for reading one task.
    pub fn task(&self, node: NodeId) -> &Task {
        self.tree.get(node)
    }

    /// Read access to the session state.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Set the selection, falling back to no-selection for a stale handle.
    pub fn select(&mut self, node: Option<NodeId>) {
        self.session.selected = node.filter(|&n| self.tree.contains(n));
    }

    /// Whether the document has unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Set the dirty flag for changes made outside the commit surface
    /// (view-state edits and the like).
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clear the dirty flag (save boundary).
    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// Whether anything can be undone / redone.
    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    /// See [`Workspace::can_undo`].
    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    /// Number of records on the undo stack. Exposed for callers that gate
    /// UI affordances on it.
    pub fn undo_len(&self) -> usize {
        self.undo.undo_len()
    }

    /// Reset to an empty untitled document.
    pub fn clear(&mut self) {
        self.tree.clear();
        self.assigners.clear();
        self.assignees.clear();
        self.statuses.clear();
        self.undo.clear();
        self.session.reset();
        self.dirty = false;
    }

    // ----- structural operations -------------------------------------------

    /// Create a task, inheriting priority/assigner/assignee/due-time-flag
    /// from `parent` (or from the workspace defaults when parentless).
    /// Position semantics follow [`TaskTree::insert`]. Records an add.
    pub fn add_task(&mut self, parent: Option<NodeId>, after: Option<NodeId>) -> NodeId {
        let task = match parent.or_else(|| after.and_then(|a| self.tree.parent_of(a))) {
            Some(p) => Task::inherited_from(self.tree.get(p)),
            None => Task::new(&self.defaults),
        };
        let node = self.tree.insert(parent, after, task);
        self.recompute_ancestor_percents(node);
        self.undo.push(UndoRecord::Add {
            path: self.tree.path_of(node),
            snapshot: self.tree.snapshot(node),
        });
        self.dirty = true;
        node
    }

    /// Remove the given subtrees.
    ///
    /// All handles are taken up front - callers must not pass re-resolved
    /// paths - and a handle invalidated by an earlier removal in the same
    /// batch (a descendant of another selected node) is skipped. Each
    /// removed root has its effort contribution zeroed through the rollup
    /// path first so ancestor totals stay correct, and is recorded as one
    /// delete with a full subtree snapshot.
    pub fn delete_tasks(&mut self, nodes: &[NodeId], now: DateTime<Utc>) {
        for &node in nodes {
            if !self.tree.contains(node) {
                continue;
            }
            if let Some(tracked) = self.session.tracked() {
                if self.tree.is_in_subtree(tracked, node) {
                    self.stop_tracking(now);
                }
            }

            let path = self.tree.path_of(node);
            let snapshot = self.tree.snapshot(node);
            rollup::commit_work_seconds(&mut self.tree, node, WorkField::Estimated, 0);
            rollup::commit_work_seconds(&mut self.tree, node, WorkField::Spent, 0);
            let parent = self.tree.parent_of(node);
            if self.session.selected == Some(node) {
                self.session.selected = None;
            }
            self.tree.remove(node);
            if let Some(p) = parent {
                self.recompute_subtree_and_ancestors(p);
            }
            self.undo.push(UndoRecord::Delete { path, snapshot });
            self.dirty = true;
        }
    }

    /// Insert copied snapshots as siblings starting at the given position.
    ///
    /// Pasted tasks are sanitized: tracking flags are cleared and their
    /// assigner/assignee/status names re-registered. Effort totals are
    /// absorbed into the ancestor chain. Records one paste covering all
    /// roots.
    pub fn paste(
        &mut self,
        snapshots: &[TaskRecord],
        parent: Option<NodeId>,
        after: Option<NodeId>,
    ) -> Vec<NodeId> {
        if snapshots.is_empty() {
            return Vec::new();
        }
        let sanitized: Vec<TaskRecord> = snapshots.iter().map(sanitize_snapshot).collect();

        let mut roots = Vec::with_capacity(sanitized.len());
        let mut position = after;
        for record in &sanitized {
            let id = self.tree.insert_record(parent, position, record);
            rollup::absorb_subtree(&mut self.tree, id);
            self.register_snapshot_names(record);
            roots.push(id);
            position = Some(id);
        }
        self.recompute_ancestor_percents(roots[0]);

        self.undo.push(UndoRecord::Paste {
            paths: roots.iter().map(|&r| self.tree.path_of(r)).collect(),
            snapshots: sanitized,
        });
        self.dirty = true;
        roots
    }

    // ----- field commits ---------------------------------------------------

    /// Commit a title edit.
    ///
    /// Blank input discards a never-titled task (the add-then-abandon flow)
    /// and cancels the edit on a task that already has a title; both are
    /// silent by design.
    pub fn commit_title(&mut self, node: NodeId, new_title: &str, now: DateTime<Utc>) -> TitleOutcome {
        let old = self.tree.get(node).title.clone();
        if new_title.is_empty() {
            if old.is_empty() {
                self.delete_tasks(&[node], now);
                return TitleOutcome::Discarded;
            }
            return TitleOutcome::Canceled;
        }
        if new_title == old {
            return TitleOutcome::Canceled;
        }
        self.tree.get_mut(node).title = new_title.to_string();
        self.undo.push(UndoRecord::FieldChange {
            path: self.tree.path_of(node),
            edit: FieldEdit::Title {
                old,
                new: new_title.to_string(),
            },
        });
        self.dirty = true;
        TitleOutcome::Written
    }

    /// Commit a notes edit. Equal text is a no-op.
    pub fn commit_notes(&mut self, node: NodeId, text: &str) {
        let old = self.tree.get(node).notes.clone();
        if text == old {
            return;
        }
        self.tree.get_mut(node).notes = text.to_string();
        self.undo.push(UndoRecord::NotesChange {
            path: self.tree.path_of(node),
            old,
            new: text.to_string(),
        });
        self.dirty = true;
    }

    /// Commit a priority edit from raw user input.
    ///
    /// Priorities must be unsigned integers within range; anything else is
    /// silently rejected with no state change and no undo record.
    pub fn commit_priority(&mut self, node: NodeId, input: &str) -> bool {
        let Ok(new) = input.parse::<u8>() else {
            return false;
        };
        if new > MAX_PRIORITY {
            return false;
        }
        let old = self.tree.get(node).priority;
        if new == old {
            return true;
        }
        self.tree.get_mut(node).priority = new;
        self.undo.push(UndoRecord::FieldChange {
            path: self.tree.path_of(node),
            edit: FieldEdit::Priority { old, new },
        });
        self.dirty = true;
        true
    }

    /// Commit a due-date edit (date parsing is the caller's concern).
    ///
    /// A date-only due is stored at midnight UTC, whatever time of day the
    /// caller passed: the wire format carries no time for it, and storing
    /// one would make the saved document diverge from the live tree.
    pub fn commit_due(&mut self, node: NodeId, due: Option<DateTime<Utc>>, has_time: bool) {
        let due = if has_time {
            due
        } else {
            due.map(|d| d.date_naive().and_time(NaiveTime::MIN).and_utc())
        };
        let task = self.tree.get(node);
        let (old, old_has_time) = (task.due_at, task.due_has_time);
        if old == due && old_has_time == has_time {
            return;
        }
        {
            let task = self.tree.get_mut(node);
            task.due_at = due;
            task.due_has_time = has_time;
        }
        self.undo.push(UndoRecord::FieldChange {
            path: self.tree.path_of(node),
            edit: FieldEdit::Due {
                old,
                old_has_time,
                new: due,
                new_has_time: has_time,
            },
        });
        self.dirty = true;
    }

    /// Commit a direct edit of the completion date.
    ///
    /// `None` clears it, overriding the usual first-completion-wins rule:
    /// an explicit edit outranks the cascade's stamp. As with the due date,
    /// parsing the caller's text (and rejecting what does not parse) is the
    /// caller's concern.
    pub fn commit_complete(&mut self, node: NodeId, completed: Option<DateTime<Utc>>) {
        let old = self.tree.get(node).completed_at;
        if old == completed {
            return;
        }
        self.tree.get_mut(node).completed_at = completed;
        self.undo.push(UndoRecord::FieldChange {
            path: self.tree.path_of(node),
            edit: FieldEdit::Completed {
                old,
                new: completed,
            },
        });
        self.dirty = true;
    }

    /// Commit an assigner edit, registering the name.
    pub fn commit_assigner(&mut self, node: NodeId, name: &str) {
        self.assigners.register(name);
        let old = self.tree.get(node).assigner.clone();
        if name == old {
            return;
        }
        self.tree.get_mut(node).assigner = name.to_string();
        self.undo.push(UndoRecord::FieldChange {
            path: self.tree.path_of(node),
            edit: FieldEdit::Assigner {
                old,
                new: name.to_string(),
            },
        });
        self.dirty = true;
    }

    /// Commit an assignee edit, registering the name.
    pub fn commit_assignee(&mut self, node: NodeId, name: &str) {
        self.assignees.register(name);
        let old = self.tree.get(node).assignee.clone();
        if name == old {
            return;
        }
        self.tree.get_mut(node).assignee = name.to_string();
        self.undo.push(UndoRecord::FieldChange {
            path: self.tree.path_of(node),
            edit: FieldEdit::Assignee {
                old,
                new: name.to_string(),
            },
        });
        self.dirty = true;
    }

    /// Commit a status-label edit, registering the label.
    pub fn commit_status(&mut self, node: NodeId, label: &str) {
        self.statuses.register(label);
        let old = self.tree.get(node).status.clone();
        if label == old {
            return;
        }
        self.tree.get_mut(node).status = label.to_string();
        self.undo.push(UndoRecord::FieldChange {
            path: self.tree.path_of(node),
            edit: FieldEdit::Status {
                old,
                new: label.to_string(),
            },
        });
        self.dirty = true;
    }

    /// Commit an estimated-effort edit in hours. Returns `false` (no state
    /// change, no record) for non-finite or negative input.
    pub fn commit_est(&mut self, node: NodeId, hours: f64) -> bool {
        self.commit_work(node, WorkField::Estimated, hours)
    }

    /// Commit a spent-effort edit in hours. Same rejection rules as
    /// [`Workspace::commit_est`].
    pub fn commit_spent(&mut self, node: NodeId, hours: f64) -> bool {
        self.commit_work(node, WorkField::Spent, hours)
    }

    fn commit_work(&mut self, node: NodeId, field: WorkField, hours: f64) -> bool {
        let Some(old_seconds) = rollup::commit_work(&mut self.tree, node, field, hours) else {
            return false;
        };
        let new_seconds = field.get(self.tree.get(node));
        if new_seconds != old_seconds {
            self.undo.push(UndoRecord::WorkChange {
                path: self.tree.path_of(node),
                field,
                old_seconds,
                new_seconds,
            });
            self.dirty = true;
        }
        true
    }

    /// Reset a branch's estimate from its direct children ("recalculate
    /// from children").
    pub fn derive_est(&mut self, node: NodeId) {
        self.derive_work(node, WorkField::Estimated);
    }

    /// Reset a branch's spent time from its direct children.
    pub fn derive_spent(&mut self, node: NodeId) {
        self.derive_work(node, WorkField::Spent);
    }

    fn derive_work(&mut self, node: NodeId, field: WorkField) {
        let old_seconds = rollup::derive_work(&mut self.tree, node, field);
        let new_seconds = field.get(self.tree.get(node));
        if new_seconds != old_seconds {
            self.undo.push(UndoRecord::WorkChange {
                path: self.tree.path_of(node),
                field,
                old_seconds,
                new_seconds,
            });
            self.dirty = true;
        }
    }

    // ----- done transitions ------------------------------------------------

    /// Toggle the done flag, cascading per the current direction: not-done
    /// to done forces the subtree, done to not-done forces the ancestors.
    /// Percent complete is recomputed along the full ancestor chain, and
    /// the cascade is recorded with its exact flipped/stamped sets.
    pub fn commit_done(&mut self, node: NodeId, now: DateTime<Utc>) {
        let cascade = if self.tree.get(node).done {
            done::mark_not_done(&mut self.tree, node, now)
        } else {
            done::mark_done(&mut self.tree, &mut self.session, node, now)
        };
        self.recompute_ancestor_percents(node);

        if let Some(stop) = cascade.track_stop {
            self.undo.push(UndoRecord::TrackToggle {
                path: self.tree.path_of(stop.node),
                started: false,
                committed: Some((stop.previous_seconds, stop.new_seconds)),
            });
        }
        self.undo.push(UndoRecord::DoneToggle {
            path: self.tree.path_of(node),
            old_done: cascade.old_done,
            new_done: cascade.new_done,
            flipped: cascade
                .flipped
                .iter()
                .map(|&n| self.tree.path_of(n))
                .collect(),
            stamped: cascade
                .stamped
                .iter()
                .map(|&n| self.tree.path_of(n))
                .collect(),
            at: cascade.at,
        });
        self.dirty = true;
    }

    // ----- time tracking ---------------------------------------------------

    /// Start the stopwatch on `node`. Rejected (returns `false`, no record)
    /// when the node is done or another node is already tracked.
    pub fn start_tracking(&mut self, node: NodeId, now: DateTime<Utc>) -> bool {
        if self.session.is_tracking() || self.tree.get(node).done {
            return false;
        }
        self.tree.get_mut(node).tracking_active = true;
        self.session.begin_tracking(node, now);
        self.undo.push(UndoRecord::TrackToggle {
            path: self.tree.path_of(node),
            started: true,
            committed: None,
        });
        self.dirty = true;
        true
    }

    /// Stop the stopwatch, committing elapsed wall-clock seconds as spent
    /// work on the tracked node. Returns `false` when nothing was tracked.
    pub fn stop_tracking(&mut self, now: DateTime<Utc>) -> bool {
        let Some((node, elapsed)) = self.session.end_tracking(now) else {
            return false;
        };
        let new_seconds = self.tree.get(node).spent_seconds + elapsed;
        let previous =
            rollup::commit_work_seconds(&mut self.tree, node, WorkField::Spent, new_seconds);
        self.tree.get_mut(node).tracking_active = false;
        self.undo.push(UndoRecord::TrackToggle {
            path: self.tree.path_of(node),
            started: false,
            committed: Some((previous, new_seconds)),
        });
        self.dirty = true;
        true
    }

    // ----- undo / redo -----------------------------------------------------

    /// Undo the most recent operation. Returns the undone record's kind, or
    /// `None` when the undo stack is empty.
    pub fn undo(&mut self) -> Option<&'static str> {
        let record = self.undo.pop_for_undo()?;
        let kind = record.kind();
        debug!(kind, "undo");
        self.apply_inverse(&record);
        self.undo.push_redone(record);
        self.dirty = true;
        Some(kind)
    }

    /// Redo the most recently undone operation. Returns the record's kind.
    pub fn redo(&mut self) -> Option<&'static str> {
        let record = self.undo.pop_for_redo()?;
        let kind = record.kind();
        debug!(kind, "redo");
        self.apply_forward(&record);
        self.undo.push_undone(record);
        self.dirty = true;
        Some(kind)
    }

    fn apply_inverse(&mut self, record: &UndoRecord) {
        match record {
            UndoRecord::Add { path, .. } => {
                // The node is back in its at-creation state (later edits
                // were undone first), so there is no effort to zero.
                self.remove_for_replay(path);
            }
            UndoRecord::Delete { path, snapshot } => {
                self.restore_snapshot(path, snapshot);
            }
            UndoRecord::FieldChange { path, edit } => {
                self.apply_field(path, edit, false);
            }
            UndoRecord::NotesChange { path, old, .. } => {
                if let Some(node) = self.resolve_replay(path) {
                    self.tree.get_mut(node).notes = old.clone();
                }
            }
            UndoRecord::WorkChange {
                path,
                field,
                old_seconds,
                ..
            } => {
                if let Some(node) = self.resolve_replay(path) {
                    rollup::commit_work_seconds(&mut self.tree, node, *field, *old_seconds);
                }
            }
            UndoRecord::DoneToggle {
                path,
                old_done,
                new_done,
                flipped,
                stamped,
                ..
            } => {
                self.invert_done_toggle(path, *old_done, *new_done, flipped, stamped);
            }
            UndoRecord::Paste { paths, .. } => {
                self.remove_pasted(paths);
            }
            UndoRecord::TrackToggle {
                path,
                started,
                committed,
            } => {
                let Some(node) = self.resolve_replay(path) else {
                    return;
                };
                if *started {
                    // Undoing a start: drop the stopwatch, nothing recorded.
                    self.session.cancel_tracking();
                    self.tree.get_mut(node).tracking_active = false;
                } else if let Some((previous, _)) = committed {
                    // Undoing a stop: give back the committed time and
                    // resume the stopwatch fresh.
                    rollup::commit_work_seconds(&mut self.tree, node, WorkField::Spent, *previous);
                    self.tree.get_mut(node).tracking_active = true;
                    self.session.begin_tracking(node, Utc::now());
                }
            }
        }
    }

    fn apply_forward(&mut self, record: &UndoRecord) {
        match record {
            UndoRecord::Add { path, snapshot } => {
                self.restore_snapshot(path, snapshot);
            }
            UndoRecord::Delete { path, .. } => {
                if let Some(node) = self.resolve_replay(path) {
                    rollup::commit_work_seconds(&mut self.tree, node, WorkField::Estimated, 0);
                    rollup::commit_work_seconds(&mut self.tree, node, WorkField::Spent, 0);
                    self.remove_for_replay(path);
                }
            }
            UndoRecord::FieldChange { path, edit } => {
                self.apply_field(path, edit, true);
            }
            UndoRecord::NotesChange { path, new, .. } => {
                if let Some(node) = self.resolve_replay(path) {
                    self.tree.get_mut(node).notes = new.clone();
                }
            }
            UndoRecord::WorkChange {
                path,
                field,
                new_seconds,
                ..
            } => {
                if let Some(node) = self.resolve_replay(path) {
                    rollup::commit_work_seconds(&mut self.tree, node, *field, *new_seconds);
                }
            }
            UndoRecord::DoneToggle {
                path, new_done, at, ..
            } => {
                if let Some(node) = self.resolve_replay(path) {
                    if *new_done {
                        done::mark_done(&mut self.tree, &mut self.session, node, *at);
                    } else {
                        done::mark_not_done(&mut self.tree, node, *at);
                    }
                    self.recompute_ancestor_percents(node);
                }
            }
            UndoRecord::Paste { paths, snapshots } => {
                for (path, snapshot) in paths.iter().zip(snapshots) {
                    self.restore_snapshot(path, snapshot);
                    self.register_snapshot_names(snapshot);
                }
            }
            UndoRecord::TrackToggle {
                path,
                started,
                committed,
            } => {
                let Some(node) = self.resolve_replay(path) else {
                    return;
                };
                if *started {
                    self.tree.get_mut(node).tracking_active = true;
                    self.session.begin_tracking(node, Utc::now());
                } else if let Some((_, new_seconds)) = committed {
                    // Re-stopping replays the recorded commit; the wall
                    // clock is never re-measured.
                    rollup::commit_work_seconds(&mut self.tree, node, WorkField::Spent, *new_seconds);
                    self.tree.get_mut(node).tracking_active = false;
                    self.session.cancel_tracking();
                }
            }
        }
    }

    /// Restore the done flags and completion stamps a cascade changed.
    fn invert_done_toggle(
        &mut self,
        path: &TreePath,
        old_done: bool,
        new_done: bool,
        flipped: &[TreePath],
        stamped: &[TreePath],
    ) {
        let Some(node) = self.resolve_replay(path) else {
            return;
        };
        self.tree.get_mut(node).done = old_done;
        for p in flipped {
            if let Some(id) = self.resolve_replay(p) {
                // The cascade forced these to `new_done`; give them back
                // their prior value, which is its inverse.
                self.tree.get_mut(id).done = !new_done;
            }
        }
        for p in stamped {
            if let Some(id) = self.resolve_replay(p) {
                self.tree.get_mut(id).completed_at = None;
            }
        }
        rollup::recompute_percent(&mut self.tree, node);
        self.recompute_ancestor_percents(node);
    }

    fn apply_field(&mut self, path: &TreePath, edit: &FieldEdit, forward: bool) {
        let Some(node) = self.resolve_replay(path) else {
            return;
        };
        let task = self.tree.get_mut(node);
        match edit {
            FieldEdit::Title { old, new } => {
                task.title = if forward { new.clone() } else { old.clone() };
            }
            FieldEdit::Priority { old, new } => {
                task.priority = if forward { *new } else { *old };
            }
            FieldEdit::Due {
                old,
                old_has_time,
                new,
                new_has_time,
            } => {
                if forward {
                    task.due_at = *new;
                    task.due_has_time = *new_has_time;
                } else {
                    task.due_at = *old;
                    task.due_has_time = *old_has_time;
                }
            }
            FieldEdit::Completed { old, new } => {
                task.completed_at = if forward { *new } else { *old };
            }
            FieldEdit::Assigner { old, new } => {
                task.assigner = if forward { new.clone() } else { old.clone() };
            }
            FieldEdit::Assignee { old, new } => {
                task.assignee = if forward { new.clone() } else { old.clone() };
            }
            FieldEdit::Status { old, new } => {
                task.status = if forward { new.clone() } else { old.clone() };
            }
        }
    }

    /// Re-insert a snapshot at its recorded position, verbatim. Bypasses
    /// inheritance and sanitization: this is a restore, not a paste.
    fn restore_snapshot(&mut self, path: &TreePath, snapshot: &TaskRecord) {
        let Some((parent, after)) = self.insertion_point(path) else {
            warn!(path = %path, "replay position no longer resolvable");
            return;
        };
        let node = self.tree.insert_record(parent, after, snapshot);
        rollup::absorb_subtree(&mut self.tree, node);
        self.recompute_ancestor_percents(node);
    }

    fn remove_for_replay(&mut self, path: &TreePath) {
        let Some(node) = self.resolve_replay(path) else {
            return;
        };
        let parent = self.tree.parent_of(node);
        if self.session.selected == Some(node) {
            self.session.selected = None;
        }
        self.tree.remove(node);
        if let Some(p) = parent {
            self.recompute_subtree_and_ancestors(p);
        }
    }

    fn remove_pasted(&mut self, paths: &[TreePath]) {
        // Reverse order keeps the earlier siblings' paths valid.
        for path in paths.iter().rev() {
            if let Some(node) = self.resolve_replay(path) {
                rollup::commit_work_seconds(&mut self.tree, node, WorkField::Estimated, 0);
                rollup::commit_work_seconds(&mut self.tree, node, WorkField::Spent, 0);
            }
            self.remove_for_replay(path);
        }
    }

    fn resolve_replay(&self, path: &TreePath) -> Option<NodeId> {
        let node = self.tree.resolve(path);
        if node.is_none() {
            warn!(path = %path, "replay path no longer resolvable");
        }
        node
    }

    /// Translate a recorded position back into insert arguments:
    /// (parent handle, prior-sibling handle).
    fn insertion_point(&self, path: &TreePath) -> Option<(Option<NodeId>, Option<NodeId>)> {
        let parent = match path.parent() {
            Some(parent_path) => Some(self.tree.resolve(&parent_path)?),
            None => None,
        };
        let index = path.sibling_index();
        let after = if index == 0 {
            None
        } else {
            let mut prior = path.indices().to_vec();
            *prior.last_mut().expect("non-empty path") -= 1;
            Some(self.tree.resolve(&TreePath::new(prior))?)
        };
        Some((parent, after))
    }

    fn register_snapshot_names(&mut self, record: &TaskRecord) {
        self.assigners.register(&record.task.assigner);
        self.assignees.register(&record.task.assignee);
        self.statuses.register(&record.task.status);
        for child in &record.children {
            self.register_snapshot_names(child);
        }
    }

    /// Recompute percent on every ancestor of `node`, bottom-up: repeated
    /// single-level recomputation to the root.
    fn recompute_ancestor_percents(&mut self, node: NodeId) {
        let mut current = node;
        while let Some(parent) = self.tree.parent_of(current) {
            rollup::recompute_percent(&mut self.tree, parent);
            current = parent;
        }
    }

    fn recompute_subtree_and_ancestors(&mut self, node: NodeId) {
        rollup::recompute_percent(&mut self.tree, node);
        self.recompute_ancestor_percents(node);
    }

    // ----- document boundary -----------------------------------------------

    /// Snapshot the workspace into a persistable document. The caller
    /// supplies the presentation half of the view state; the selected path
    /// comes from the session.
    pub fn to_document(&self, view: &ViewState) -> Document {
        Document {
            version: SCHEMA_VERSION.to_string(),
            assigners: self.assigners.names().to_vec(),
            assignees: self.assignees.names().to_vec(),
            statuses: self.statuses.names().to_vec(),
            tasks: self
                .tree
                .roots()
                .iter()
                .map(|&r| self.tree.snapshot(r))
                .collect(),
            expanded: view.expanded.iter().map(TreePath::to_string).collect(),
            selected: self
                .session
                .selected
                .map(|node| self.tree.path_of(node).to_string()),
            columns: view.columns.clone(),
            geometry: view.geometry.clone(),
        }
    }

    /// Replace the workspace contents with a loaded document.
    ///
    /// Everything transient resets: undo history, stopwatch, dirty flag.
    /// The stored selection is resolved gracefully - a stale path falls
    /// back to no selection. Returns the presentation view state for the
    /// caller to restore.
    pub fn load_document(&mut self, doc: &Document) -> ViewState {
        self.clear();
        self.assigners = NameRegistry::from(doc.assigners.clone());
        self.assignees = NameRegistry::from(doc.assignees.clone());
        self.statuses = NameRegistry::from(doc.statuses.clone());

        let mut previous = None;
        for record in &doc.tasks {
            let id = self.tree.insert_record(None, previous, record);
            previous = Some(id);
        }

        self.session.selected = doc
            .selected
            .as_deref()
            .and_then(|s| s.parse::<TreePath>().ok())
            .and_then(|p| self.tree.resolve(&p));

        let expanded = doc
            .expanded
            .iter()
            .filter_map(|s| s.parse::<TreePath>().ok())
            .filter(|p| self.tree.resolve(p).is_some())
            .collect();
        ViewState {
            expanded,
            columns: doc.columns.clone(),
            geometry: doc.geometry.clone(),
        }
    }
}

fn sanitize_snapshot(record: &TaskRecord) -> TaskRecord {
    let mut task = record.task.clone();
    task.tracking_active = false;
    TaskRecord {
        task,
        children: record.children.iter().map(sanitize_snapshot).collect(),
    }
}
