use std::fmt;
use std::fmt::Write as _;

use bramble_table::{FieldId, Symbol};
use text_size::{TextRange, TextSize};

use crate::{Length, Point, Range, Subtree, Tree, TreeCursor};

/// A positioned view of a subtree, borrowed from its tree.
///
/// Nodes are cheap to copy. Parents are found by descending from the root,
/// since subtrees do not link back to the trees containing them.
#[derive(Clone, Copy)]
pub struct Node<'tree> {
    tree: &'tree Tree,
    subtree: &'tree Subtree,
    start: Length,
}

impl<'tree> Node<'tree> {
    pub(crate) fn new(tree: &'tree Tree, subtree: &'tree Subtree, start: Length) -> Self {
        Self { tree, subtree, start }
    }

    pub fn tree(self) -> &'tree Tree {
        self.tree
    }

    pub fn subtree(self) -> &'tree Subtree {
        self.subtree
    }

    pub fn kind(self) -> &'tree str {
        self.tree.language().symbol_name(self.subtree.symbol())
    }

    pub fn kind_id(self) -> Symbol {
        self.subtree.symbol()
    }

    pub fn is_named(self) -> bool {
        self.tree.language().is_named(self.subtree.symbol())
    }

    pub fn is_extra(self) -> bool {
        self.subtree.is_extra()
    }

    pub fn is_error(self) -> bool {
        self.subtree.is_error()
    }

    pub fn is_missing(self) -> bool {
        self.subtree.is_missing()
    }

    /// Whether this node or any descendant is an error or missing node.
    pub fn has_error(self) -> bool {
        self.subtree.has_error()
    }

    pub fn has_changes(self) -> bool {
        self.subtree.has_changes()
    }

    #[inline]
    pub fn start_byte(self) -> TextSize {
        self.start.bytes
    }

    #[inline]
    pub fn end_byte(self) -> TextSize {
        self.end().bytes
    }

    #[inline]
    pub fn byte_range(self) -> TextRange {
        TextRange::new(self.start_byte(), self.end_byte())
    }

    pub fn start_point(self) -> Point {
        self.start.extent
    }

    pub fn end_point(self) -> Point {
        self.end().extent
    }

    pub fn range(self) -> Range {
        Range::new(self.start, self.end())
    }

    #[inline]
    fn end(self) -> Length {
        self.start + self.subtree.size()
    }

    pub fn child_count(self) -> usize {
        self.subtree.child_count()
    }

    pub fn child(self, index: usize) -> Option<Self> {
        self.children().nth(index)
    }

    pub fn children(self) -> Children<'tree> {
        Children { tree: self.tree, iter: self.subtree.children().iter(), offset: self.start }
    }

    pub fn named_children(self) -> impl Iterator<Item = Self> {
        self.children().filter(|child| child.is_named())
    }

    pub fn named_child_count(self) -> usize {
        self.named_children().count()
    }

    pub fn named_child(self, index: usize) -> Option<Self> {
        self.named_children().nth(index)
    }

    pub fn first_child(self) -> Option<Self> {
        self.children().next()
    }

    /// Returns the field bound to the child at `index`.
    pub fn field_for_child(self, index: usize) -> Option<FieldId> {
        let language = self.tree.language();
        let production_id = self.subtree.production_id();
        if self.subtree.is_leaf()
            || self.subtree.is_error()
            || production_id.index() >= language.production_count()
        {
            return None;
        }
        let children = self.subtree.children();
        if children.get(index)?.is_extra() {
            return None;
        }
        let structural_index = children[..index].iter().filter(|child| !child.is_extra()).count();
        language.production(production_id).field_for_child(structural_index)
    }

    pub fn field_name_for_child(self, index: usize) -> Option<&'tree str> {
        self.tree.language().field_name(self.field_for_child(index)?)
    }

    /// Returns the children bound to `field`, in order.
    pub fn children_by_field_id(self, field: FieldId) -> impl Iterator<Item = Self> {
        self.children()
            .enumerate()
            .filter(move |&(index, _)| self.field_for_child(index) == Some(field))
            .map(|(_, child)| child)
    }

    pub fn child_by_field_name(self, name: &str) -> Option<Self> {
        let field = self.tree.language().field_id_for_name(name)?;
        self.children_by_field_id(field).next()
    }

    /// Name of the field this node is bound to in its parent.
    pub fn field_name(self) -> Option<&'tree str> {
        let parent = self.parent()?;
        let index = parent.children().position(|child| child == self)?;
        parent.field_name_for_child(index)
    }

    pub fn parent(self) -> Option<Self> {
        find_parent(self.tree.root_node(), self)
    }

    pub fn next_sibling(self) -> Option<Self> {
        let parent = self.parent()?;
        parent.children().skip_while(|&child| child != self).nth(1)
    }

    pub fn prev_sibling(self) -> Option<Self> {
        let parent = self.parent()?;
        parent.children().take_while(|&child| child != self).last()
    }

    pub fn next_named_sibling(self) -> Option<Self> {
        let parent = self.parent()?;
        parent.children().skip_while(|&child| child != self).skip(1).find(|child| child.is_named())
    }

    pub fn prev_named_sibling(self) -> Option<Self> {
        let parent = self.parent()?;
        parent.children().take_while(|&child| child != self).filter(|child| child.is_named()).last()
    }

    /// Returns the deepest descendant whose range contains `start..end`.
    pub fn descendant_for_byte_range(self, start: TextSize, end: TextSize) -> Self {
        self.descend(start, end, false)
    }

    /// Like [`Node::descendant_for_byte_range`], but only named nodes qualify.
    pub fn named_descendant_for_byte_range(self, start: TextSize, end: TextSize) -> Self {
        self.descend(start, end, true)
    }

    fn descend(self, start: TextSize, end: TextSize, named: bool) -> Self {
        let mut node = self;
        let mut found = self;
        'outer: loop {
            for child in node.children() {
                let touches_end = start == end && child.end_byte() == node.end_byte();
                let covers = child.start_byte() <= start
                    && end <= child.end_byte()
                    && (start < child.end_byte() || touches_end);
                if covers {
                    node = child;
                    if !named || child.is_named() {
                        found = child;
                    }
                    continue 'outer;
                }
            }
            return found;
        }
    }

    pub fn walk(self) -> TreeCursor<'tree> {
        TreeCursor::new(self)
    }

    /// Returns the node's text, if it is valid UTF-8.
    pub fn utf8_text(self, source: &[u8]) -> Option<&str> {
        let range = std::ops::Range::<usize>::from(self.byte_range());
        std::str::from_utf8(source.get(range)?).ok()
    }

    /// Renders the named nodes below and including this one as an
    /// s-expression, with field labels and `MISSING` markers.
    pub fn to_sexp(self) -> String {
        let mut out = String::new();
        if self.is_visible() {
            self.write_sexp(&mut out);
        } else {
            self.write_sexp_children(&mut out);
        }
        out.trim_start().to_owned()
    }

    /// Named nodes and missing tokens; unrecognized bytes are left out.
    fn is_visible(self) -> bool {
        (self.is_named() && !(self.is_error() && self.subtree.is_leaf())) || self.is_missing()
    }

    fn write_sexp(self, out: &mut String) {
        out.push('(');
        if self.is_missing() {
            out.push_str("MISSING ");
            if self.is_named() {
                out.push_str(self.kind());
            } else {
                let _ = write!(out, "{:?}", self.kind());
            }
        } else {
            out.push_str(self.kind());
        }
        self.write_sexp_children(out);
        out.push(')');
    }

    fn write_sexp_children(self, out: &mut String) {
        for (index, child) in self.children().enumerate() {
            if child.is_visible() {
                out.push(' ');
                if let Some(field) = self.field_name_for_child(index) {
                    out.push_str(field);
                    out.push_str(": ");
                }
                child.write_sexp(out);
            } else {
                child.write_sexp_children(out);
            }
        }
    }
}

fn find_parent<'tree>(node: Node<'tree>, target: Node<'tree>) -> Option<Node<'tree>> {
    for child in node.children() {
        if child == target {
            return Some(node);
        }
        let contains =
            child.start_byte() <= target.start_byte() && target.end_byte() <= child.end_byte();
        if contains
            && !child.subtree.is_leaf()
            && let Some(parent) = find_parent(child, target)
        {
            return Some(parent);
        }
        if child.start_byte() > target.start_byte() {
            break;
        }
    }
    None
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.subtree.ptr_eq(other.subtree) && self.start == other.start
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_named() {
            write!(f, "{}@{:?}", self.kind(), self.byte_range())
        } else {
            write!(f, "{:?}@{:?}", self.kind(), self.byte_range())
        }
    }
}

/// Iterator over the children of a [`Node`].
#[derive(Clone)]
pub struct Children<'tree> {
    tree: &'tree Tree,
    iter: std::slice::Iter<'tree, Subtree>,
    offset: Length,
}

impl<'tree> Iterator for Children<'tree> {
    type Item = Node<'tree>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let subtree = self.iter.next()?;
        let node = Node::new(self.tree, subtree, self.offset);
        self.offset += subtree.size();
        Some(node)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl ExactSizeIterator for Children<'_> {}
