//! The ownership-bearing task tree.
//!
//! Nodes live in an arena of generation-checked slots. A [`NodeId`] is a
//! stable handle that survives arbitrary mutation elsewhere in the tree and
//! goes stale (detectably, not dangling) when its node is removed and the
//! slot reused. Display paths ([`TreePath`]) are computed on demand and are
//! only valid until the next structural change at or before them in tree
//! order - they are addresses, never identity.

use std::fmt;
use std::str::FromStr;

use crate::models::{Task, TaskRecord};

/// A generational node identifier for safe cross-references into the tree.
///
/// Unlike a raw index, `NodeId` includes a generation counter that
/// increments when a slot is freed. A handle held across a removal of its
/// node fails validity checks instead of silently addressing whatever task
/// was allocated into the reused slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    /// The slot index in the arena.
    idx: u32,
    /// Generation counter for detecting stale references.
    generation: u32,
}

impl NodeId {
    fn new(idx: u32, generation: u32) -> Self {
        Self { idx, generation }
    }

    /// The raw slot index. For diagnostics only.
    pub fn index(self) -> usize {
        self.idx as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.idx, self.generation)
    }
}

/// A structural, display-only address: zero-based sibling indices from a
/// root (e.g. `2:0:1` is the third root's first child's second child).
///
/// Paths are invalidated by structural edits; hold a [`NodeId`] instead
/// whenever a reference must survive mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreePath(Vec<usize>);

impl TreePath {
    /// Build a path from sibling indices. The sequence must be non-empty to
    /// address a node; an empty path addresses nothing.
    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    /// The sibling indices from the root.
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// The path of this node's parent, or `None` for a root-level path.
    pub fn parent(&self) -> Option<TreePath> {
        if self.0.len() > 1 {
            Some(TreePath(self.0[..self.0.len() - 1].to_vec()))
        } else {
            None
        }
    }

    /// The node's position among its siblings.
    pub fn sibling_index(&self) -> usize {
        *self.0.last().expect("empty path has no sibling index")
    }

    /// Depth of the addressed node (1 for roots).
    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for idx in &self.0 {
            if !first {
                write!(f, ":")?;
            }
            write!(f, "{}", idx)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for TreePath {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let indices = s
            .split(':')
            .map(|part| {
                part.parse::<usize>()
                    .map_err(|_| crate::Error::InvalidInput(format!("bad path segment: {part:?}")))
            })
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(TreePath(indices))
    }
}

/// A slot in the arena with generational tracking.
#[derive(Debug)]
struct Slot {
    /// Incremented each time the slot's node is removed.
    generation: u32,
    node: Option<Node>,
}

#[derive(Debug)]
struct Node {
    task: Task,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An ordered forest of tasks with stable handles.
///
/// The tree owns every [`Task`]; all access goes through [`NodeId`] handles.
/// Structural operations keep parent/child links and sibling order
/// consistent but never touch derived fields - percent and effort rollups
/// are the [`crate::rollup`] module's job.
#[derive(Debug, Default)]
pub struct TaskTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    roots: Vec<NodeId>,
    live: usize,
}

impl TaskTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Root nodes in sibling order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Whether a handle still addresses a live node.
    pub fn contains(&self, node: NodeId) -> bool {
        self.slots
            .get(node.idx as usize)
            .is_some_and(|slot| slot.generation == node.generation && slot.node.is_some())
    }

    fn node(&self, id: NodeId) -> &Node {
        let slot = &self.slots[id.idx as usize];
        assert_eq!(slot.generation, id.generation, "stale node handle {id}");
        slot.node.as_ref().expect("freed node handle")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        let slot = &mut self.slots[id.idx as usize];
        assert_eq!(slot.generation, id.generation, "stale node handle {id}");
        slot.node.as_mut().expect("freed node handle")
    }

    /// Shared access to a task. Panics on a stale handle; use
    /// [`TaskTree::try_get`] when the handle may have been invalidated.
    pub fn get(&self, node: NodeId) -> &Task {
        &self.node(node).task
    }

    /// Exclusive access to a task. Panics on a stale handle.
    pub fn get_mut(&mut self, node: NodeId) -> &mut Task {
        &mut self.node_mut(node).task
    }

    /// Shared access to a task, or `None` for a stale handle.
    pub fn try_get(&self, node: NodeId) -> Option<&Task> {
        if self.contains(node) {
            Some(self.get(node))
        } else {
            None
        }
    }

    /// The node's parent, or `None` for roots.
    pub fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).parent
    }

    /// The node's children in sibling order.
    pub fn children_of(&self, node: NodeId) -> &[NodeId] {
        &self.node(node).children
    }

    /// Whether the node has no children.
    pub fn is_leaf(&self, node: NodeId) -> bool {
        self.node(node).children.is_empty()
    }

    /// Insert a new node.
    ///
    /// With `after` given, the node lands immediately after that sibling
    /// under the same parent (`parent` is ignored). Otherwise it is
    /// prepended as the first child of `parent`, or the first root when
    /// `parent` is `None`. Returns a stable handle.
    ///
    /// Passing a dangling `parent` or `after` handle is a contract
    /// violation, checked in debug builds.
    pub fn insert(&mut self, parent: Option<NodeId>, after: Option<NodeId>, task: Task) -> NodeId {
        debug_assert!(
            parent.is_none_or(|p| self.contains(p)),
            "insert under dangling parent handle"
        );
        debug_assert!(
            after.is_none_or(|a| self.contains(a)),
            "insert after dangling sibling handle"
        );

        let (parent, position) = match after {
            Some(sibling) => {
                let parent = self.node(sibling).parent;
                let siblings = match parent {
                    Some(p) => &self.node(p).children,
                    None => &self.roots,
                };
                let at = siblings
                    .iter()
                    .position(|&c| c == sibling)
                    .expect("sibling not in its parent's child list");
                (parent, at + 1)
            }
            None => (parent, 0),
        };

        let id = self.alloc(Node {
            task,
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(p) => self.node_mut(p).children.insert(position, id),
            None => self.roots.insert(position, id),
        }
        id
    }

    /// Detach a node and its entire subtree, freeing their slots.
    ///
    /// Ancestor rollups are NOT recomputed here; callers that need them
    /// consistent must zero the node's effort contributions first (see
    /// [`crate::rollup::commit_work`]).
    pub fn remove(&mut self, node: NodeId) {
        let parent = self.node(node).parent;
        match parent {
            Some(p) => self.node_mut(p).children.retain(|&c| c != node),
            None => self.roots.retain(|&c| c != node),
        }

        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let slot = &mut self.slots[id.idx as usize];
            let freed = slot.node.take().expect("double free in subtree removal");
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.idx);
            self.live -= 1;
            stack.extend(freed.children);
        }
    }

    /// Drop every node, invalidating all outstanding handles.
    pub fn clear(&mut self) {
        let roots: Vec<NodeId> = self.roots.clone();
        for root in roots {
            self.remove(root);
        }
    }

    /// The node's display path. Valid only until the next structural edit;
    /// never use it as a persistent key.
    pub fn path_of(&self, node: NodeId) -> TreePath {
        let mut indices = Vec::new();
        let mut current = node;
        loop {
            let parent = self.node(current).parent;
            let siblings = match parent {
                Some(p) => &self.node(p).children,
                None => &self.roots,
            };
            let at = siblings
                .iter()
                .position(|&c| c == current)
                .expect("node not in its parent's child list");
            indices.push(at);
            match parent {
                Some(p) => current = p,
                None => break,
            }
        }
        indices.reverse();
        TreePath::new(indices)
    }

    /// Resolve a display path to a handle, or `None` if the path is stale
    /// or structurally invalid. Callers must handle `None` gracefully
    /// (typically by falling back to no selection).
    pub fn resolve(&self, path: &TreePath) -> Option<NodeId> {
        let mut indices = path.indices().iter();
        let first = *indices.next()?;
        let mut current = *self.roots.get(first)?;
        for &idx in indices {
            current = *self.node(current).children.get(idx)?;
        }
        Some(current)
    }

    /// Strict descendants of a node in pre-order.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.node(node).children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.node(id).children.iter().rev());
        }
        out
    }

    /// Whether `node` is `ancestor` itself or one of its descendants.
    pub fn is_in_subtree(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.node(id).parent;
        }
        false
    }

    /// Deep-copy a subtree into an owned snapshot.
    pub fn snapshot(&self, node: NodeId) -> TaskRecord {
        let n = self.node(node);
        TaskRecord {
            task: n.task.clone(),
            children: n.children.iter().map(|&c| self.snapshot(c)).collect(),
        }
    }

    /// Bulk-insert a snapshot subtree at the given position (same position
    /// semantics as [`TaskTree::insert`]). Fields are restored verbatim;
    /// returns the handle of the new subtree root.
    pub fn insert_record(
        &mut self,
        parent: Option<NodeId>,
        after: Option<NodeId>,
        record: &TaskRecord,
    ) -> NodeId {
        let root = self.insert(parent, after, record.task.clone());
        self.append_children(root, &record.children);
        root
    }

    fn append_children(&mut self, parent: NodeId, children: &[TaskRecord]) {
        let mut prev: Option<NodeId> = None;
        for child in children {
            let id = self.insert(Some(parent), prev, child.task.clone());
            self.append_children(id, &child.children);
            prev = Some(id);
        }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.live += 1;
        match self.free.pop() {
            Some(idx) => {
                let slot = &mut self.slots[idx as usize];
                slot.node = Some(node);
                NodeId::new(idx, slot.generation)
            }
            None => {
                let idx = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId::new(idx, 0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskDefaults;

    fn titled(title: &str) -> Task {
        Task {
            title: title.to_string(),
            ..Task::new(&TaskDefaults::default())
        }
    }

    fn title_of(tree: &TaskTree, node: NodeId) -> &str {
        &tree.get(node).title
    }

    #[test]
    fn test_insert_prepends_without_sibling() {
        let mut tree = TaskTree::new();
        let b = tree.insert(None, None, titled("b"));
        let a = tree.insert(None, None, titled("a"));
        assert_eq!(tree.roots(), &[a, b]);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_insert_after_sibling_ignores_parent_arg() {
        let mut tree = TaskTree::new();
        let root = tree.insert(None, None, titled("root"));
        let first = tree.insert(Some(root), None, titled("first"));
        // A bogus parent argument must be ignored when `after` is given.
        let second = tree.insert(None, Some(first), titled("second"));
        assert_eq!(tree.children_of(root), &[first, second]);
        assert_eq!(tree.parent_of(second), Some(root));
    }

    #[test]
    fn test_insert_after_root_sibling() {
        let mut tree = TaskTree::new();
        let a = tree.insert(None, None, titled("a"));
        let c = tree.insert(None, Some(a), titled("c"));
        let b = tree.insert(None, Some(a), titled("b"));
        assert_eq!(tree.roots(), &[a, b, c]);
    }

    #[test]
    fn test_path_of_and_resolve() {
        let mut tree = TaskTree::new();
        let r0 = tree.insert(None, None, titled("r0"));
        let r1 = tree.insert(None, Some(r0), titled("r1"));
        let c0 = tree.insert(Some(r1), None, titled("c0"));
        let c1 = tree.insert(Some(r1), Some(c0), titled("c1"));

        assert_eq!(tree.path_of(c1).to_string(), "1:1");
        assert_eq!(tree.resolve(&"1:1".parse().unwrap()), Some(c1));
        assert_eq!(tree.resolve(&"1:0".parse().unwrap()), Some(c0));
        assert_eq!(tree.resolve(&"0".parse().unwrap()), Some(r0));
        assert_eq!(tree.resolve(&"2".parse().unwrap()), None);
        assert_eq!(tree.resolve(&"0:0".parse().unwrap()), None);
    }

    #[test]
    fn test_path_parse_rejects_garbage() {
        assert!("1:x".parse::<TreePath>().is_err());
        assert!("".parse::<TreePath>().is_err());
    }

    #[test]
    fn test_handles_survive_sibling_mutation() {
        let mut tree = TaskTree::new();
        let a = tree.insert(None, None, titled("a"));
        let b = tree.insert(None, Some(a), titled("b"));
        let c = tree.insert(None, Some(b), titled("c"));

        // Removing a sibling shifts c's path but not its handle.
        let path_before = tree.path_of(c);
        tree.remove(a);
        assert!(tree.contains(c));
        assert_eq!(title_of(&tree, c), "c");
        assert_ne!(tree.path_of(c), path_before);
    }

    #[test]
    fn test_removed_handle_goes_stale() {
        let mut tree = TaskTree::new();
        let a = tree.insert(None, None, titled("a"));
        let child = tree.insert(Some(a), None, titled("child"));
        tree.remove(a);

        assert!(!tree.contains(a));
        assert!(!tree.contains(child));
        assert!(tree.try_get(child).is_none());
        assert!(tree.is_empty());

        // Slot reuse must not resurrect the old handle.
        let fresh = tree.insert(None, None, titled("fresh"));
        assert!(tree.contains(fresh));
        assert!(!tree.contains(a));
        assert!(!tree.contains(child));
    }

    #[test]
    fn test_descendants_preorder() {
        let mut tree = TaskTree::new();
        let root = tree.insert(None, None, titled("root"));
        let a = tree.insert(Some(root), None, titled("a"));
        let b = tree.insert(Some(root), Some(a), titled("b"));
        let a1 = tree.insert(Some(a), None, titled("a1"));
        let a2 = tree.insert(Some(a), Some(a1), titled("a2"));

        assert_eq!(tree.descendants(root), vec![a, a1, a2, b]);
        assert_eq!(tree.descendants(b), Vec::new());
    }

    #[test]
    fn test_is_in_subtree() {
        let mut tree = TaskTree::new();
        let root = tree.insert(None, None, titled("root"));
        let a = tree.insert(Some(root), None, titled("a"));
        let a1 = tree.insert(Some(a), None, titled("a1"));
        let b = tree.insert(None, Some(root), titled("b"));

        assert!(tree.is_in_subtree(a1, root));
        assert!(tree.is_in_subtree(a1, a));
        assert!(tree.is_in_subtree(root, root));
        assert!(!tree.is_in_subtree(b, root));
    }

    #[test]
    fn test_snapshot_and_insert_record_round_trip() {
        let mut tree = TaskTree::new();
        let root = tree.insert(None, None, titled("root"));
        let a = tree.insert(Some(root), None, titled("a"));
        tree.insert(Some(a), None, titled("a1"));
        tree.insert(Some(root), Some(a), titled("b"));

        let snapshot = tree.snapshot(root);
        assert_eq!(snapshot.count(), 4);

        tree.remove(root);
        assert!(tree.is_empty());

        let restored = tree.insert_record(None, None, &snapshot);
        assert_eq!(tree.snapshot(restored), snapshot);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_clear_invalidates_everything() {
        let mut tree = TaskTree::new();
        let a = tree.insert(None, None, titled("a"));
        let b = tree.insert(None, Some(a), titled("b"));
        tree.insert(Some(b), None, titled("b1"));
        tree.clear();
        assert!(tree.is_empty());
        assert!(!tree.contains(a));
        assert!(tree.roots().is_empty());
    }
}
