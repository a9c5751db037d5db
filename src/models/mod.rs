//! Data models for Capstan entities.
//!
//! This module defines the core data structures:
//! - `Task` - the per-node payload: priority, progress, effort, schedule,
//!   assignment, and state flags
//! - `TaskRecord` - a deep, owned snapshot of a subtree (task + children)
//! - `TaskDefaults` - tree-wide defaults applied when a task is created
//!   without a parent to inherit from
//! - `NameRegistry` - a document-scoped, deduplicated list of free-text
//!   labels (assigners, assignees, status labels)

use chrono::{DateTime, Utc};
use std::fmt;

/// Default priority for new tasks with nothing to inherit from.
pub const DEFAULT_PRIORITY: u8 = 5;

/// Highest accepted priority value (inclusive).
pub const MAX_PRIORITY: u8 = 25;

/// Which effort field a work commit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkField {
    /// Estimated time, in seconds.
    Estimated,
    /// Actual (spent) time, in seconds.
    Spent,
}

impl WorkField {
    /// Read this field from a task.
    pub fn get(self, task: &Task) -> u64 {
        match self {
            WorkField::Estimated => task.estimated_seconds,
            WorkField::Spent => task.spent_seconds,
        }
    }

    /// Write this field on a task.
    pub fn set(self, task: &mut Task, seconds: u64) {
        match self {
            WorkField::Estimated => task.estimated_seconds = seconds,
            WorkField::Spent => task.spent_seconds = seconds,
        }
    }
}

impl fmt::Display for WorkField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkField::Estimated => "est",
            WorkField::Spent => "spent",
        };
        write!(f, "{}", s)
    }
}

/// A single task node's payload.
///
/// Progress (`percent_complete`) and branch-level effort totals are derived
/// fields maintained by the [`crate::rollup`] module; callers should not
/// write them directly outside of load paths.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Priority level (0-25, lower is more urgent). Inherited from the
    /// parent on creation.
    pub priority: u8,

    /// Percent complete (0-100). Derived from descendant leaves for branch
    /// nodes; forced to 0 (or 100 when done) for leaves.
    pub percent_complete: u8,

    /// Estimated effort in seconds. Leaf-editable; derived as the sum of
    /// direct children for branch nodes.
    pub estimated_seconds: u64,

    /// Actual effort in seconds. Same shape as `estimated_seconds`.
    pub spent_seconds: u64,

    /// Planned start. Write-only passthrough; nothing in the engine reads it.
    pub est_begin: Option<DateTime<Utc>>,

    /// Planned completion. Write-only passthrough.
    pub est_complete: Option<DateTime<Utc>>,

    /// Actual start. Write-only passthrough.
    pub actual_begin: Option<DateTime<Utc>>,

    /// Set when the task first transitions to done. Never cleared or
    /// overwritten afterwards (first completion wins).
    pub completed_at: Option<DateTime<Utc>>,

    /// Due date, interpreted per `due_has_time`.
    pub due_at: Option<DateTime<Utc>>,

    /// Whether `due_at` (and serialized timestamps on this task) carry a
    /// time-of-day component or are date-only.
    pub due_has_time: bool,

    /// Who assigned the task. Deduplicated into the document's assigner
    /// registry on commit.
    pub assigner: String,

    /// Who the task is assigned to. Registry-deduplicated on commit.
    pub assignee: String,

    /// Free-text status label. Registry-deduplicated on commit.
    pub status: String,

    /// Task title. A blank title on a brand-new task signals "discard".
    pub title: String,

    /// Multi-line notes.
    pub notes: String,

    /// Done flag. Transitions cascade; see [`crate::done`].
    pub done: bool,

    /// Whether this task's spent time is currently being tracked. At most
    /// one task in a tree may have this set.
    pub tracking_active: bool,
}

impl Task {
    /// Create a task from tree-wide defaults.
    pub fn new(defaults: &TaskDefaults) -> Self {
        Self {
            priority: defaults.priority,
            percent_complete: 0,
            estimated_seconds: 0,
            spent_seconds: 0,
            est_begin: None,
            est_complete: None,
            actual_begin: None,
            completed_at: None,
            due_at: None,
            due_has_time: defaults.due_has_time,
            assigner: defaults.assigner.clone(),
            assignee: defaults.assignee.clone(),
            status: String::new(),
            title: String::new(),
            notes: String::new(),
            done: false,
            tracking_active: false,
        }
    }

    /// Create a task inheriting priority, assigner, assignee, and the
    /// due-time flag from a parent task.
    pub fn inherited_from(parent: &Task) -> Self {
        Self {
            priority: parent.priority,
            due_has_time: parent.due_has_time,
            assigner: parent.assigner.clone(),
            assignee: parent.assignee.clone(),
            ..Self::new(&TaskDefaults::default())
        }
    }

    /// Whether this task has never been given a title.
    pub fn is_untitled(&self) -> bool {
        self.title.is_empty()
    }
}

impl Default for Task {
    fn default() -> Self {
        Self::new(&TaskDefaults::default())
    }
}

/// Tree-wide defaults for new root-level tasks.
#[derive(Debug, Clone)]
pub struct TaskDefaults {
    /// Priority assigned to tasks with no parent to inherit from.
    pub priority: u8,
    /// Default assigner name.
    pub assigner: String,
    /// Default assignee name.
    pub assignee: String,
    /// Default date-only vs date+time interpretation for due dates.
    pub due_has_time: bool,
}

impl Default for TaskDefaults {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            assigner: String::new(),
            assignee: String::new(),
            due_has_time: false,
        }
    }
}

/// A deep snapshot of a subtree: one task's fields plus its children,
/// recursively.
///
/// Snapshots own independent copies of everything they hold - they never
/// alias live tree storage, so they stay valid after the source nodes are
/// removed or their slots reused. Used by delete/paste undo records and as
/// the document's task shape.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    /// The node's payload at snapshot time.
    pub task: Task,
    /// Child subtrees in sibling order.
    pub children: Vec<TaskRecord>,
}

impl TaskRecord {
    /// A childless record wrapping one task.
    pub fn leaf(task: Task) -> Self {
        Self {
            task,
            children: Vec::new(),
        }
    }

    /// Total number of tasks in this snapshot, including the root.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(TaskRecord::count).sum::<usize>()
    }
}

/// A document-scoped, insertion-ordered, deduplicated list of names.
///
/// Used for the assigner, assignee, and status-label lists: committing a
/// task field registers the value here so the UI layer can offer it for
/// completion, and the document codec round-trips the lists as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameRegistry {
    names: Vec<String>,
}

impl NameRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a name, ignoring blanks and duplicates.
    ///
    /// Returns `true` if the name was newly added.
    pub fn register(&mut self, name: &str) -> bool {
        if name.is_empty() || self.names.iter().any(|n| n == name) {
            return false;
        }
        self.names.push(name.to_string());
        true
    }

    /// The registered names, in first-seen order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Whether a name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Drop all registered names.
    pub fn clear(&mut self) {
        self.names.clear();
    }
}

impl From<Vec<String>> for NameRegistry {
    fn from(mut names: Vec<String>) -> Self {
        names.dedup();
        let mut registry = NameRegistry::new();
        for name in names {
            registry.register(&name);
        }
        registry
    }
}
