//! In-memory ordered containers built around an AVL tree.
//!
//! [`AvlTree`] keeps a parent link on every node and rebalances iteratively:
//! after each insert or removal it walks from the changed node to the root,
//! refreshing cached heights and rotating wherever a balance factor leaves
//! `-1..=1`. Nodes live in an index arena owned by
//! [`BinarySearchTree`], so parent links never own anything.
//!
//! ```
//! use avl_tree::AvlTree;
//!
//! let mut tree = AvlTree::from([1, 2, 3]);
//! assert_eq!(tree.to_string(), "AVL pre-order { 2, 1, 3 }");
//! assert!(tree.remove(&2));
//! assert!(!tree.contains(&2));
//! assert!(tree.is_valid_avl());
//! ```

mod avl_tree;
mod binary_search_tree;
mod error;
mod queue;
mod stack;

pub use avl_tree::{AvlTree, Height};
pub use binary_search_tree::{BinarySearchTree, InOrder, LevelOrder, NodeId, NodeRef, PreOrder};
pub use error::{Result, TreeError};
pub use queue::Queue;
pub use stack::Stack;
