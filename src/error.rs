use thiserror::Error;

/// Errors surfaced by the tree containers.
///
/// Removing a value that is not present is not an error; `remove` reports it
/// through its boolean return instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TreeError {
    /// A read that needs at least one element (`find_min`, `find_max`,
    /// `root`) was issued against an empty tree.
    #[error("tree is empty")]
    EmptyTree,
}

pub type Result<T, E = TreeError> = std::result::Result<T, E>;
