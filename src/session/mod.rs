//! Per-window session state: the tracking stopwatch and the selection.
//!
//! This state is deliberately kept outside the task tree. The stopwatch is
//! logical: only a start timestamp is stored, and elapsed time is computed
//! lazily when tracking stops - no background timer exists anywhere in the
//! engine. The [`crate::workspace::Workspace`] owns a `Session` and passes
//! it around explicitly.

use chrono::{DateTime, Utc};

use crate::tree::NodeId;

/// Mutable per-session state owned by the orchestrating layer.
#[derive(Debug, Default)]
pub struct Session {
    /// The currently tracked node and the wall-clock instant tracking
    /// started. At most one node is tracked at a time (the tree-side
    /// `tracking_active` flags mirror this).
    tracking: Option<(NodeId, DateTime<Utc>)>,

    /// The currently selected node, if any. Callers fall back to
    /// no-selection when a restore path fails to resolve.
    pub selected: Option<NodeId>,
}

impl Session {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// The node currently being tracked, if any.
    pub fn tracked(&self) -> Option<NodeId> {
        self.tracking.map(|(node, _)| node)
    }

    /// Whether any node is currently tracked.
    pub fn is_tracking(&self) -> bool {
        self.tracking.is_some()
    }

    /// Begin tracking `node` at `started_at`. The caller has already
    /// validated the single-tracker invariant.
    pub(crate) fn begin_tracking(&mut self, node: NodeId, started_at: DateTime<Utc>) {
        debug_assert!(self.tracking.is_none(), "tracker already running");
        self.tracking = Some((node, started_at));
    }

    /// Stop the stopwatch, returning the tracked node and elapsed whole
    /// seconds against `now`. `None` when nothing was tracked.
    pub(crate) fn end_tracking(&mut self, now: DateTime<Utc>) -> Option<(NodeId, u64)> {
        let (node, started_at) = self.tracking.take()?;
        let elapsed = (now - started_at).num_seconds().max(0) as u64;
        Some((node, elapsed))
    }

    /// Abandon the stopwatch without computing elapsed time (undo of a
    /// tracking start, where nothing was recorded yet).
    pub(crate) fn cancel_tracking(&mut self) {
        self.tracking = None;
    }

    /// Forget all session state (new-file / load boundaries).
    pub fn reset(&mut self) {
        self.tracking = None;
        self.selected = None;
    }
}
