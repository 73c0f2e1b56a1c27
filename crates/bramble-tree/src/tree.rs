use std::fmt;
use std::fmt::Write as _;

use bramble_table::Language;
use text_size::TextSize;

use crate::{InputEdit, Length, Node, Preorder, StaleTree, Subtree, TreeCursor};

/// An immutable syntax tree together with the language that produced it.
///
/// The root covers the whole input: every byte belongs to exactly one leaf.
#[derive(Clone)]
pub struct Tree {
    root: Subtree,
    language: Language,
}

impl Tree {
    pub fn new(root: Subtree, language: Language) -> Self {
        Self { root, language }
    }

    pub fn root(&self) -> &Subtree {
        &self.root
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn root_node(&self) -> Node<'_> {
        Node::new(self, &self.root, Length::ZERO)
    }

    /// Length of the parsed text in bytes.
    pub fn len(&self) -> TextSize {
        self.root.size().bytes
    }

    pub fn is_empty(&self) -> bool {
        self.root.size().is_empty()
    }

    pub fn has_error(&self) -> bool {
        self.root.has_error()
    }

    pub fn walk(&self) -> TreeCursor<'_> {
        self.root_node().walk()
    }

    pub fn preorder(&self) -> Preorder<'_> {
        self.walk().preorder()
    }

    /// Returns the deepest node containing the byte at `offset`.
    pub fn node_at_byte(&self, offset: TextSize) -> Node<'_> {
        self.root_node().descendant_for_byte_range(offset, offset)
    }

    /// Applies an edit, leaving this tree untouched.
    pub fn edit(&self, edit: &InputEdit) -> StaleTree {
        StaleTree::new(self, edit)
    }

    pub fn to_sexp(&self) -> String {
        self.root_node().to_sexp()
    }

    /// Renders every node, one per line, with fields and byte ranges.
    pub fn debug_dump(&self) -> String {
        let mut out = String::new();
        for visit in self.preorder() {
            let node = visit.node;
            let _ = write!(out, "{:indent$}", "", indent = visit.depth * 2);
            if let Some(field) = visit.field_name {
                let _ = write!(out, "{field}: ");
            }
            if node.is_missing() {
                out.push_str("MISSING ");
            }
            let _ = write!(out, "{node:?}");
            if node.is_extra() {
                out.push_str(" extra");
            }
            out.push('\n');
        }
        out
    }
}

/// Trees are equal when their structure is, regardless of sharing.
impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.language == other.language && self.root == other.root
    }
}

impl Eq for Tree {}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("language", &self.language.name())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
