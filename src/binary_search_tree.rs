use std::cmp::Ordering;
use std::fmt;

use tracing::trace;

use crate::error::{Result, TreeError};
use crate::queue::Queue;
use crate::stack::Stack;

/// Slot index into a tree's arena. Slots are recycled after removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Node<T, A> {
    pub(crate) value: T,
    pub(crate) left: Option<NodeId>,
    pub(crate) right: Option<NodeId>,
    /// Non-owning back link. `None` only on the root.
    pub(crate) parent: Option<NodeId>,
    pub(crate) aug: A,
}

/// Unbalanced binary search tree over an arena of nodes. `A` is per-node
/// data this type never reads; equal values are routed right.
#[derive(Clone)]
pub struct BinarySearchTree<T, A = ()> {
    slots: Vec<Option<Node<T, A>>>,
    free: Vec<NodeId>,
    root: Option<NodeId>,
    len: usize,
}

impl<T, A> BinarySearchTree<T, A> {
    pub fn new() -> Self {
        BinarySearchTree {
            slots: Vec::new(),
            free: Vec::new(),
            root: None,
            len: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        BinarySearchTree {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            root: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.root = None;
        self.len = 0;
    }

    pub fn root_id(&self) -> Option<NodeId> {
        self.root
    }

    pub fn root(&self) -> Result<&T> {
        self.root
            .map(|id| &self.node(id).value)
            .ok_or(TreeError::EmptyTree)
    }

    pub fn get(&self, id: NodeId) -> Option<NodeRef<'_, T, A>> {
        match self.slots.get(id.index()) {
            Some(Some(_)) => Some(NodeRef { tree: self, id }),
            _ => None,
        }
    }

    pub fn min(&self) -> Result<&T> {
        let root = self.root.ok_or(TreeError::EmptyTree)?;
        Ok(&self.node(self.min_node(root)).value)
    }

    pub fn max(&self) -> Result<&T> {
        let root = self.root.ok_or(TreeError::EmptyTree)?;
        Ok(&self.node(self.max_node(root)).value)
    }

    pub fn iter(&self) -> InOrder<'_, T, A> {
        InOrder {
            tree: self,
            stack: Stack::new(),
            current: self.root,
        }
    }

    pub fn in_order(&self) -> InOrder<'_, T, A> {
        self.iter()
    }

    pub fn pre_order(&self) -> PreOrder<'_, T, A> {
        let mut stack = Stack::new();
        if let Some(root) = self.root {
            stack.push(root);
        }
        PreOrder { tree: self, stack }
    }

    pub fn level_order(&self) -> LevelOrder<'_, T, A> {
        let mut queue = Queue::new();
        if let Some(root) = self.root {
            queue.enqueue(root);
        }
        LevelOrder { tree: self, queue }
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node<T, A> {
        self.slots[id.index()]
            .as_ref()
            .unwrap_or_else(|| panic!("{id:?} refers to a released slot"))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node<T, A> {
        self.slots[id.index()]
            .as_mut()
            .unwrap_or_else(|| panic!("{id:?} refers to a released slot"))
    }

    pub(crate) fn min_node(&self, from: NodeId) -> NodeId {
        let mut current = from;
        while let Some(left) = self.node(current).left {
            current = left;
        }
        current
    }

    pub(crate) fn max_node(&self, from: NodeId) -> NodeId {
        let mut current = from;
        while let Some(right) = self.node(current).right {
            current = right;
        }
        current
    }

    fn alloc(&mut self, node: Node<T, A>) -> NodeId {
        self.len += 1;
        if let Some(id) = self.free.pop() {
            self.slots[id.index()] = Some(node);
            return id;
        }
        let raw = u32::try_from(self.slots.len()).expect("node arena exceeds u32::MAX slots");
        self.slots.push(Some(node));
        NodeId(raw)
    }

    fn release(&mut self, id: NodeId) -> Node<T, A> {
        let node = self.slots[id.index()]
            .take()
            .unwrap_or_else(|| panic!("{id:?} released twice"));
        self.free.push(id);
        self.len -= 1;
        node
    }

    /// Points `parent`'s link to `old` at `new` instead (or the root link when
    /// `parent` is `None`) and sets `new`'s back link to `parent`.
    pub(crate) fn reattach(&mut self, parent: Option<NodeId>, old: NodeId, new: Option<NodeId>) {
        match parent {
            None => self.root = new,
            Some(p) => {
                let node = self.node_mut(p);
                if node.left == Some(old) {
                    node.left = new;
                } else {
                    debug_assert_eq!(node.right, Some(old));
                    node.right = new;
                }
            }
        }
        if let Some(new) = new {
            self.node_mut(new).parent = parent;
        }
    }

    /// Removes a node that has at most one child, moving the child (if any)
    /// into its place. Returns the detached node.
    pub(crate) fn splice_out(&mut self, id: NodeId) -> Node<T, A> {
        let node = self.node(id);
        debug_assert!(node.left.is_none() || node.right.is_none());
        let child = node.left.or(node.right);
        let parent = node.parent;
        self.reattach(parent, id, child);
        self.release(id)
    }

    /// Structurally removes `id` from the tree and returns its value together
    /// with the parent of the slot that was physically freed, which is where
    /// any upward repair has to start.
    ///
    /// A node with two children takes over its in-order successor's value and
    /// the successor's slot is freed instead.
    pub(crate) fn unlink(&mut self, id: NodeId) -> (T, Option<NodeId>) {
        let node = self.node(id);
        let target = match (node.left, node.right) {
            (Some(_), Some(right)) => self.min_node(right),
            _ => id,
        };
        let detached = self.splice_out(target);
        trace!(node = ?id, freed = ?target, "unlinked node");
        let repair_from = detached.parent;
        if target == id {
            (detached.value, repair_from)
        } else {
            let value = std::mem::replace(&mut self.node_mut(id).value, detached.value);
            (value, repair_from)
        }
    }

    /// Left rotation around `id`; its right child becomes the subtree root.
    /// Only links are touched. Returns the new subtree root.
    pub(crate) fn rotate_left(&mut self, id: NodeId) -> NodeId {
        let node = self.node(id);
        let parent = node.parent;
        let pivot = node.right.expect("rotate_left needs a right child");
        let inner = self.node(pivot).left;

        self.node_mut(id).right = inner;
        if let Some(inner) = inner {
            self.node_mut(inner).parent = Some(id);
        }
        self.reattach(parent, id, Some(pivot));
        self.node_mut(pivot).left = Some(id);
        self.node_mut(id).parent = Some(pivot);
        pivot
    }

    pub(crate) fn rotate_right(&mut self, id: NodeId) -> NodeId {
        let node = self.node(id);
        let parent = node.parent;
        let pivot = node.left.expect("rotate_right needs a left child");
        let inner = self.node(pivot).right;

        self.node_mut(id).left = inner;
        if let Some(inner) = inner {
            self.node_mut(inner).parent = Some(id);
        }
        self.reattach(parent, id, Some(pivot));
        self.node_mut(pivot).right = Some(id);
        self.node_mut(id).parent = Some(pivot);
        pivot
    }
}

impl<T: Ord, A> BinarySearchTree<T, A> {
    pub fn insert_with(&mut self, value: T, aug: A) -> NodeId {
        let Some(mut current) = self.root else {
            let id = self.alloc(Node {
                value,
                left: None,
                right: None,
                parent: None,
                aug,
            });
            self.root = Some(id);
            return id;
        };

        let go_left = loop {
            let node = self.node(current);
            let go_left = value < node.value;
            match if go_left { node.left } else { node.right } {
                Some(child) => current = child,
                None => break go_left,
            }
        };

        let id = self.alloc(Node {
            value,
            left: None,
            right: None,
            parent: Some(current),
            aug,
        });
        let parent = self.node_mut(current);
        if go_left {
            parent.left = Some(id);
        } else {
            parent.right = Some(id);
        }
        id
    }

    /// First node on the search path whose value equals `value`.
    pub fn find(&self, value: &T) -> Option<NodeId> {
        let mut current = self.root;
        while let Some(id) = current {
            let node = self.node(id);
            current = match value.cmp(&node.value) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Some(id),
            };
        }
        None
    }

    pub fn contains(&self, value: &T) -> bool {
        self.find(value).is_some()
    }
}

impl<T: Ord, A: Default> BinarySearchTree<T, A> {
    pub fn insert(&mut self, value: T) -> NodeId {
        self.insert_with(value, A::default())
    }

    pub fn remove(&mut self, value: &T) -> bool {
        match self.find(value) {
            Some(id) => {
                self.unlink(id);
                true
            }
            None => false,
        }
    }
}

impl<T, A> Default for BinarySearchTree<T, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug, A> fmt::Debug for BinarySearchTree<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<'a, T, A> IntoIterator for &'a BinarySearchTree<T, A> {
    type Item = &'a T;
    type IntoIter = InOrder<'a, T, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Ord, A: Default> FromIterator<T> for BinarySearchTree<T, A> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut tree = Self::new();
        for value in iter {
            tree.insert(value);
        }
        tree
    }
}

pub struct NodeRef<'a, T, A> {
    tree: &'a BinarySearchTree<T, A>,
    id: NodeId,
}

impl<'a, T, A> NodeRef<'a, T, A> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn value(&self) -> &'a T {
        &self.tree.node(self.id).value
    }

    pub fn aug(&self) -> &'a A {
        &self.tree.node(self.id).aug
    }

    pub fn left(&self) -> Option<NodeRef<'a, T, A>> {
        self.link(self.tree.node(self.id).left)
    }

    pub fn right(&self) -> Option<NodeRef<'a, T, A>> {
        self.link(self.tree.node(self.id).right)
    }

    pub fn parent(&self) -> Option<NodeRef<'a, T, A>> {
        self.link(self.tree.node(self.id).parent)
    }

    pub fn is_leaf(&self) -> bool {
        let node = self.tree.node(self.id);
        node.left.is_none() && node.right.is_none()
    }

    fn link(&self, id: Option<NodeId>) -> Option<NodeRef<'a, T, A>> {
        id.map(|id| NodeRef {
            tree: self.tree,
            id,
        })
    }
}

impl<T, A> Clone for NodeRef<'_, T, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, A> Copy for NodeRef<'_, T, A> {}

impl<T: fmt::Debug, A: fmt::Debug> fmt::Debug for NodeRef<'_, T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.tree.node(self.id);
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("value", &node.value)
            .field("aug", &node.aug)
            .finish()
    }
}

pub struct InOrder<'a, T, A> {
    tree: &'a BinarySearchTree<T, A>,
    stack: Stack<NodeId>,
    current: Option<NodeId>,
}

impl<'a, T, A> Iterator for InOrder<'a, T, A> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        while let Some(id) = self.current {
            self.stack.push(id);
            self.current = tree.node(id).left;
        }
        let id = self.stack.pop()?;
        let node = tree.node(id);
        self.current = node.right;
        Some(&node.value)
    }
}

pub struct PreOrder<'a, T, A> {
    tree: &'a BinarySearchTree<T, A>,
    stack: Stack<NodeId>,
}

impl<'a, T, A> Iterator for PreOrder<'a, T, A> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        let id = self.stack.pop()?;
        let node = tree.node(id);
        if let Some(right) = node.right {
            self.stack.push(right);
        }
        if let Some(left) = node.left {
            self.stack.push(left);
        }
        Some(&node.value)
    }
}

pub struct LevelOrder<'a, T, A> {
    tree: &'a BinarySearchTree<T, A>,
    queue: Queue<NodeId>,
}

impl<'a, T, A> Iterator for LevelOrder<'a, T, A> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        let id = self.queue.dequeue()?;
        let node = tree.node(id);
        if let Some(left) = node.left {
            self.queue.enqueue(left);
        }
        if let Some(right) = node.right {
            self.queue.enqueue(right);
        }
        Some(&node.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(values: &[i32]) -> BinarySearchTree<i32> {
        values.iter().copied().collect()
    }

    fn links_consistent<T, A>(bst: &BinarySearchTree<T, A>) -> bool {
        let Some(root) = bst.root_id() else {
            return bst.len() == 0;
        };
        if bst.node(root).parent.is_some() {
            return false;
        }
        let mut stack = Stack::new();
        stack.push(root);
        let mut seen = 0;
        while let Some(id) = stack.pop() {
            seen += 1;
            let node = bst.node(id);
            for child in [node.left, node.right].into_iter().flatten() {
                if bst.node(child).parent != Some(id) {
                    return false;
                }
                stack.push(child);
            }
        }
        seen == bst.len()
    }

    #[test]
    fn new_tree_is_empty() {
        let bst: BinarySearchTree<i32> = BinarySearchTree::new();
        assert!(bst.is_empty());
        assert_eq!(bst.len(), 0);
        assert_eq!(bst.root(), Err(TreeError::EmptyTree));
    }

    #[test]
    fn min_max_on_empty_are_errors() {
        let bst: BinarySearchTree<i32> = BinarySearchTree::default();
        assert_eq!(bst.min(), Err(TreeError::EmptyTree));
        assert_eq!(bst.max(), Err(TreeError::EmptyTree));
    }

    #[test]
    fn insert_sets_parent_links() {
        let mut bst: BinarySearchTree<i32> = BinarySearchTree::new();
        let root = bst.insert(50);
        let left = bst.insert(30);
        let right = bst.insert(70);
        assert_eq!(bst.root_id(), Some(root));
        assert_eq!(bst.node(left).parent, Some(root));
        assert_eq!(bst.node(right).parent, Some(root));
        assert_eq!(bst.node(root).left, Some(left));
        assert_eq!(bst.node(root).right, Some(right));
    }

    #[test]
    fn duplicates_go_right() {
        let mut bst: BinarySearchTree<i32> = BinarySearchTree::new();
        let first = bst.insert(7);
        let second = bst.insert(7);
        assert_eq!(bst.node(first).right, Some(second));
        assert_eq!(bst.len(), 2);
    }

    #[test]
    fn find_returns_matching_node() {
        let bst = build(&[50, 30, 70, 20, 40]);
        let id = bst.find(&40).unwrap();
        assert_eq!(bst.get(id).unwrap().value(), &40);
        assert!(bst.find(&45).is_none());
        assert!(bst.contains(&20));
    }

    #[test]
    fn traversal_orders() {
        let bst = build(&[50, 30, 70, 20, 40]);
        assert_eq!(bst.in_order().copied().collect::<Vec<_>>(), vec![20, 30, 40, 50, 70]);
        assert_eq!(bst.pre_order().copied().collect::<Vec<_>>(), vec![50, 30, 20, 40, 70]);
        assert_eq!(bst.level_order().copied().collect::<Vec<_>>(), vec![50, 30, 70, 20, 40]);
    }

    #[test]
    fn traversal_is_restartable() {
        let bst = build(&[2, 1, 3]);
        let mut first = bst.iter();
        assert_eq!(first.next(), Some(&1));
        assert_eq!(bst.iter().count(), 3);
        assert_eq!((&bst).into_iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn traversals_on_empty_tree() {
        let bst: BinarySearchTree<i32> = BinarySearchTree::new();
        assert_eq!(bst.in_order().count(), 0);
        assert_eq!(bst.pre_order().count(), 0);
        assert_eq!(bst.level_order().count(), 0);
    }

    #[test]
    fn remove_leaf() {
        let mut bst = build(&[50, 30, 70]);
        assert!(bst.remove(&30));
        assert!(!bst.contains(&30));
        assert_eq!(bst.len(), 2);
        assert!(links_consistent(&bst));
    }

    #[test]
    fn remove_node_with_one_child() {
        let mut bst = build(&[50, 30, 20]);
        assert!(bst.remove(&30));
        assert_eq!(bst.pre_order().copied().collect::<Vec<_>>(), vec![50, 20]);
        assert!(links_consistent(&bst));
    }

    #[test]
    fn remove_root_with_one_child_promotes_child() {
        let mut bst = build(&[50, 70, 60]);
        assert!(bst.remove(&50));
        assert_eq!(bst.root(), Ok(&70));
        assert!(links_consistent(&bst));
    }

    #[test]
    fn remove_node_with_two_children_takes_successor() {
        let mut bst = build(&[50, 30, 70, 20, 40, 35]);
        let id = bst.find(&30).unwrap();
        assert!(bst.remove(&30));
        assert_eq!(bst.node(id).value, 35);
        assert_eq!(bst.in_order().copied().collect::<Vec<_>>(), vec![20, 35, 40, 50, 70]);
        assert!(links_consistent(&bst));
    }

    #[test]
    fn remove_nonexistent_is_noop() {
        let mut bst = build(&[50]);
        assert!(!bst.remove(&100));
        assert_eq!(bst.len(), 1);
    }

    #[test]
    fn remove_everything_then_reuse_slots() {
        let mut bst = build(&[50, 30, 70, 20, 40]);
        for v in [20, 40, 30, 70, 50] {
            assert!(bst.remove(&v));
        }
        assert!(bst.is_empty());
        bst.insert(1);
        bst.insert(2);
        assert_eq!(bst.len(), 2);
        assert!(bst.slots.len() <= 5);
        assert!(links_consistent(&bst));
    }

    #[test]
    fn rotations_preserve_order_and_links() {
        let mut bst = build(&[10, 5, 20, 15, 30]);
        let root = bst.root_id().unwrap();
        let pivot = bst.rotate_left(root);
        assert_eq!(bst.root_id(), Some(pivot));
        assert_eq!(bst.pre_order().copied().collect::<Vec<_>>(), vec![20, 10, 5, 15, 30]);
        assert!(links_consistent(&bst));

        let back = bst.rotate_right(pivot);
        assert_eq!(back, root);
        assert_eq!(bst.pre_order().copied().collect::<Vec<_>>(), vec![10, 5, 20, 15, 30]);
        assert!(links_consistent(&bst));
    }

    #[test]
    fn rotation_below_root_reattaches_to_parent() {
        let mut bst = build(&[50, 30, 20, 10]);
        let thirty = bst.find(&30).unwrap();
        let pivot = bst.rotate_right(thirty);
        assert_eq!(bst.node(pivot).value, 20);
        assert_eq!(bst.node(pivot).parent, bst.root_id());
        assert_eq!(bst.pre_order().copied().collect::<Vec<_>>(), vec![50, 20, 10, 30]);
        assert!(links_consistent(&bst));
    }

    #[test]
    fn node_ref_navigation() {
        let bst = build(&[2, 1, 3]);
        let root = bst.get(bst.root_id().unwrap()).unwrap();
        let left = root.left().unwrap();
        assert_eq!(left.value(), &1);
        assert!(left.is_leaf());
        assert_eq!(left.parent().unwrap().id(), root.id());
        assert!(root.parent().is_none());
    }

    #[test]
    fn clear_makes_tree_empty() {
        let mut bst = build(&[3, 1, 2]);
        bst.clear();
        assert!(bst.is_empty());
        assert_eq!(bst.len(), 0);
        assert_eq!(bst.iter().count(), 0);
    }

    #[test]
    fn clone_is_independent() {
        let mut bst = build(&[50, 30]);
        let clone = bst.clone();
        bst.remove(&30);
        assert!(clone.contains(&30));
        assert!(!bst.contains(&30));
    }

    #[test]
    fn debug_renders_as_set() {
        let bst = build(&[2, 1, 3]);
        assert_eq!(format!("{bst:?}"), "{1, 2, 3}");
    }
}
