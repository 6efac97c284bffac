use std::fmt;

use tracing::{debug, trace};

use crate::binary_search_tree::{BinarySearchTree, InOrder, LevelOrder, NodeId, NodeRef, PreOrder};
use crate::error::Result;
use crate::stack::Stack;

/// Cached subtree height. A leaf is 0 and an absent subtree counts as -1.
pub type Height = i32;

/// AVL tree over a [`BinarySearchTree`] whose per-node data is the subtree
/// height. Equal values are allowed; a rotation may move one into a left
/// subtree.
#[derive(Clone)]
pub struct AvlTree<T> {
    tree: BinarySearchTree<T, Height>,
}

impl<T> AvlTree<T> {
    pub fn new() -> Self {
        AvlTree {
            tree: BinarySearchTree::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        AvlTree {
            tree: BinarySearchTree::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn make_empty(&mut self) {
        debug!(discarded = self.tree.len(), "make_empty");
        self.tree.clear();
    }

    pub fn root(&self) -> Result<&T> {
        self.tree.root()
    }

    pub fn find_min(&self) -> Result<&T> {
        self.tree.min()
    }

    pub fn find_max(&self) -> Result<&T> {
        self.tree.max()
    }

    /// Height of the root in edges, `None` for an empty tree.
    pub fn height(&self) -> Option<usize> {
        self.tree
            .root_id()
            .map(|root| self.tree.node(root).aug as usize)
    }

    pub fn inorder_traversal(&self) -> InOrder<'_, T, Height> {
        self.tree.in_order()
    }

    pub fn iter(&self) -> InOrder<'_, T, Height> {
        self.tree.iter()
    }

    pub fn pre_order(&self) -> PreOrder<'_, T, Height> {
        self.tree.pre_order()
    }

    pub fn level_order(&self) -> LevelOrder<'_, T, Height> {
        self.tree.level_order()
    }

    /// Checks cached heights, balance factors and parent links of every
    /// reachable node, and that every live node is reachable.
    pub fn is_valid_avl(&self) -> bool {
        let Some(root) = self.tree.root_id() else {
            return self.tree.len() == 0;
        };

        let mut stack = Stack::with_capacity(self.height().map_or(1, |h| h + 1));
        stack.push(root);
        let mut reachable = 0;
        while let Some(id) = stack.pop() {
            reachable += 1;
            let node = self.tree.node(id);
            let left = self.height_of(node.left);
            let right = self.height_of(node.right);
            if node.aug != 1 + left.max(right) || (left - right).abs() > 1 {
                return false;
            }

            match node.parent {
                Some(parent) => {
                    let parent = self.tree.node(parent);
                    if parent.left != Some(id) && parent.right != Some(id) {
                        return false;
                    }
                }
                None if id != root => return false,
                None => {}
            }

            if let Some(right) = node.right {
                stack.push(right);
            }
            if let Some(left) = node.left {
                stack.push(left);
            }
        }
        reachable == self.tree.len()
    }

    fn height_of(&self, id: Option<NodeId>) -> Height {
        id.map_or(-1, |id| self.tree.node(id).aug)
    }

    fn update_height(&mut self, id: NodeId) {
        let node = self.tree.node(id);
        let height = 1 + self.height_of(node.left).max(self.height_of(node.right));
        self.tree.node_mut(id).aug = height;
    }

    fn balance_factor(&self, id: NodeId) -> Height {
        let node = self.tree.node(id);
        self.height_of(node.left) - self.height_of(node.right)
    }

    fn rotate_left(&mut self, id: NodeId) -> NodeId {
        let pivot = self.tree.rotate_left(id);
        self.update_height(id);
        self.update_height(pivot);
        trace!(node = ?id, ?pivot, "rotate left");
        pivot
    }

    fn rotate_right(&mut self, id: NodeId) -> NodeId {
        let pivot = self.tree.rotate_right(id);
        self.update_height(id);
        self.update_height(pivot);
        trace!(node = ?id, ?pivot, "rotate right");
        pivot
    }

    /// Restores the balance factor at `id`, assuming both subtrees are
    /// already valid. Returns whichever node now roots this subtree.
    ///
    /// A child leaning the same way, or not leaning at all, takes a single
    /// rotation. Only a child leaning the opposite way takes a double one.
    fn rebalance_node(&mut self, id: NodeId) -> NodeId {
        let balance = self.balance_factor(id);
        if balance < -1 {
            if let Some(right) = self.tree.node(id).right {
                if self.balance_factor(right) > 0 {
                    trace!(node = ?id, "rebalance RL");
                    self.rotate_right(right);
                } else {
                    trace!(node = ?id, "rebalance RR");
                }
            }
            self.rotate_left(id)
        } else if balance > 1 {
            if let Some(left) = self.tree.node(id).left {
                if self.balance_factor(left) < 0 {
                    trace!(node = ?id, "rebalance LR");
                    self.rotate_left(left);
                } else {
                    trace!(node = ?id, "rebalance LL");
                }
            }
            self.rotate_right(id)
        } else {
            id
        }
    }

    fn repair_heights(&mut self, from: Option<NodeId>) {
        let mut current = from;
        while let Some(id) = current {
            self.update_height(id);
            current = self.tree.node(id).parent;
        }
    }

    /// Walks from `from` to the root, refreshing each height and rotating
    /// wherever the balance factor is out of range. Every ancestor is
    /// checked; a removal can need rotations at several levels.
    fn rebalance(&mut self, from: Option<NodeId>) {
        let mut current = from;
        while let Some(id) = current {
            self.update_height(id);
            let top = self.rebalance_node(id);
            current = self.tree.node(top).parent;
        }
    }
}

impl<T: Ord> AvlTree<T> {
    pub fn add(&mut self, value: T) {
        let id = self.tree.insert_with(value, 0);
        self.repair_heights(Some(id));
        self.rebalance(Some(id));
    }

    pub fn remove(&mut self, value: &T) -> bool {
        let Some(id) = self.tree.find(value) else {
            return false;
        };
        let (_, repair_from) = self.tree.unlink(id);
        debug!(node = ?id, ?repair_from, "removed value");
        self.repair_heights(repair_from);
        self.rebalance(repair_from);
        true
    }

    pub fn find(&self, value: &T) -> Option<NodeRef<'_, T, Height>> {
        self.tree.find(value).and_then(|id| self.tree.get(id))
    }

    pub fn contains(&self, value: &T) -> bool {
        self.tree.contains(value)
    }
}

impl<'a, T> NodeRef<'a, T, Height> {
    pub fn height(&self) -> Height {
        *self.aug()
    }
}

impl<T> Default for AvlTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for AvlTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvlTree")
            .field("len", &self.len())
            .field("values", &self.tree)
            .finish()
    }
}

impl<T: fmt::Display> fmt::Display for AvlTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AVL pre-order { ")?;
        for (i, value) in self.pre_order().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(" }")
    }
}

impl<T: Ord> Extend<T> for AvlTree<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

impl<T: Ord> FromIterator<T> for AvlTree<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut tree = Self::new();
        tree.extend(iter);
        tree
    }
}

impl<T: Ord, const N: usize> From<[T; N]> for AvlTree<T> {
    fn from(values: [T; N]) -> Self {
        Self::from_iter(values)
    }
}

impl<'a, T> IntoIterator for &'a AvlTree<T> {
    type Item = &'a T;
    type IntoIter = InOrder<'a, T, Height>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
