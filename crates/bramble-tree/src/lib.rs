//! Persistent syntax trees.
//!
//! Trees are built from reference-counted [`Subtree`]s that store lengths
//! instead of positions. Editing a tree copies only the path to the edit and
//! shares everything else, which lets the parser reuse unchanged subtrees.

mod cursor;
mod edit;
mod external;
mod length;
mod node;
mod subtree;
mod tree;

pub use cursor::{Preorder, TreeCursor, Visit};
pub use edit::{InputEdit, StaleTree};
pub use external::ExternalState;
pub use length::{Length, Point, Range};
pub use node::{Children, Node};
pub use subtree::{
    ERROR_COST_PER_MISSING_TREE, ERROR_COST_PER_RECOVERY, ERROR_COST_PER_SKIPPED_CHAR,
    ERROR_COST_PER_SKIPPED_LINE, ERROR_COST_PER_SKIPPED_TREE, Subtree,
};
pub use tree::Tree;

#[cfg(test)]
mod tests;
