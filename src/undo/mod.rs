//! The undo/redo log.
//!
//! Every committed mutation pushes a tagged [`UndoRecord`] carrying exactly
//! the data needed to both re-apply and invert it - nothing is re-derived
//! from current tree state at replay time. The log itself is two stacks and
//! knows nothing about trees; applying a record's effect is the
//! [`crate::workspace::Workspace`] layer's job, which keeps record storage
//! separate from record application.
//!
//! Records address nodes by display path rather than by handle: under the
//! log's strict LIFO discipline a stored path is always valid in the exact
//! tree state the record is applied against, and paths survive the slot
//! reuse that raw handles do not.

use chrono::{DateTime, Utc};

use crate::models::{TaskRecord, WorkField};
use crate::tree::TreePath;

/// One scalar-field edit, with enough of both sides to replay either way.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEdit {
    Title {
        old: String,
        new: String,
    },
    Priority {
        old: u8,
        new: u8,
    },
    Due {
        old: Option<DateTime<Utc>>,
        old_has_time: bool,
        new: Option<DateTime<Utc>>,
        new_has_time: bool,
    },
    /// A direct edit of the completion date, distinct from the stamps a
    /// done cascade writes.
    Completed {
        old: Option<DateTime<Utc>>,
        new: Option<DateTime<Utc>>,
    },
    Assigner {
        old: String,
        new: String,
    },
    Assignee {
        old: String,
        new: String,
    },
    Status {
        old: String,
        new: String,
    },
}

/// A replayable, invertible record of one committed operation.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoRecord {
    /// A task was created. The snapshot holds its at-creation state so redo
    /// can recreate it exactly even though creation used inheritance.
    Add {
        /// Where the new node was inserted.
        path: TreePath,
        /// The created node's state (new tasks are childless).
        snapshot: TaskRecord,
    },

    /// A subtree was removed. Undo re-inserts the snapshot verbatim -
    /// a restore, not a paste, so inheritance and sanitization are bypassed.
    Delete {
        /// The removed root's former position.
        path: TreePath,
        /// Full recursive copy of the removed subtree.
        snapshot: TaskRecord,
    },

    /// A scalar field changed.
    FieldChange { path: TreePath, edit: FieldEdit },

    /// The notes text changed.
    NotesChange {
        path: TreePath,
        old: String,
        new: String,
    },

    /// An effort field changed through the rollup path.
    WorkChange {
        path: TreePath,
        field: WorkField,
        old_seconds: u64,
        new_seconds: u64,
    },

    /// A done/not-done cascade ran. `flipped` and `stamped` capture the
    /// cascade's full effect so undo restores every touched node, not just
    /// the toggled one; `at` lets redo replay with the identical timestamp.
    DoneToggle {
        path: TreePath,
        old_done: bool,
        new_done: bool,
        flipped: Vec<TreePath>,
        stamped: Vec<TreePath>,
        at: DateTime<Utc>,
    },

    /// Snapshots were pasted in. `paths` are the resulting root positions in
    /// insertion order.
    Paste {
        paths: Vec<TreePath>,
        snapshots: Vec<TaskRecord>,
    },

    /// Tracking started or stopped. A start carries no committed time (none
    /// was recorded yet); a stop carries the (old, new) spent seconds it
    /// committed so replay never re-measures the wall clock.
    TrackToggle {
        path: TreePath,
        started: bool,
        committed: Option<(u64, u64)>,
    },
}

impl UndoRecord {
    /// Short operation-kind name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            UndoRecord::Add { .. } => "add",
            UndoRecord::Delete { .. } => "delete",
            UndoRecord::FieldChange { .. } => "field-change",
            UndoRecord::NotesChange { .. } => "notes-change",
            UndoRecord::WorkChange { .. } => "work-change",
            UndoRecord::DoneToggle { .. } => "done-toggle",
            UndoRecord::Paste { .. } => "paste",
            UndoRecord::TrackToggle { .. } => "track-toggle",
        }
    }
}

/// Two parallel record stacks, bounded only by memory.
///
/// Pushing a fresh record always clears the redo side: a new edit forks
/// history. The undo/redo pair stays a true LIFO mirror - every record
/// popped from one side is pushed onto the other after application, so no
/// operation is ever dropped silently.
#[derive(Debug, Default)]
pub struct UndoLog {
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
}

impl UndoLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly committed operation, clearing the redo stack.
    pub fn push(&mut self, record: UndoRecord) {
        self.redo_stack.clear();
        self.undo_stack.push(record);
    }

    /// Pop the most recent record for inversion. The caller applies the
    /// inverse effect and hands the record to [`UndoLog::push_redone`].
    pub fn pop_for_undo(&mut self) -> Option<UndoRecord> {
        self.undo_stack.pop()
    }

    /// Pop the most recently undone record for re-application. The caller
    /// applies the forward effect and hands the record to
    /// [`UndoLog::push_undone`].
    pub fn pop_for_redo(&mut self) -> Option<UndoRecord> {
        self.redo_stack.pop()
    }

    /// Park an inverted record on the redo stack.
    pub fn push_redone(&mut self, record: UndoRecord) {
        self.redo_stack.push(record);
    }

    /// Return a re-applied record to the undo stack without forking history.
    pub fn push_undone(&mut self, record: UndoRecord) {
        self.undo_stack.push(record);
    }

    /// Number of undoable operations.
    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    /// Number of redoable operations.
    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Whether anything can be undone.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Whether anything can be redone.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Drop all history (new-file / load boundaries).
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
