use text_size::TextSize;

use crate::Node;

/// A stateful walker over a node and its descendants.
///
/// The cursor never leaves the node it was created on.
#[derive(Clone)]
pub struct TreeCursor<'tree> {
    /// Each entry is a node and its index among its parent's children.
    stack: Vec<(Node<'tree>, usize)>,
}

impl<'tree> TreeCursor<'tree> {
    pub fn new(node: Node<'tree>) -> Self {
        let mut stack = Vec::with_capacity(32);
        stack.push((node, 0));
        Self { stack }
    }

    pub fn reset(&mut self, node: Node<'tree>) {
        self.stack.clear();
        self.stack.push((node, 0));
    }

    pub fn node(&self) -> Node<'tree> {
        self.stack[self.stack.len() - 1].0
    }

    /// Depth of the current node below the cursor's starting node.
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    /// Parent of the current node, unless it is the starting node.
    pub fn parent(&self) -> Option<Node<'tree>> {
        let [.., (parent, _), _] = &self.stack[..] else { return None };
        Some(*parent)
    }

    /// Index of the current node among its parent's children.
    pub fn child_index(&self) -> usize {
        self.stack[self.stack.len() - 1].1
    }

    /// Name of the field the current node is bound to in its parent.
    pub fn field_name(&self) -> Option<&'tree str> {
        let [.., (parent, _), (_, index)] = &self.stack[..] else { return None };
        parent.field_name_for_child(*index)
    }

    pub fn goto_first_child(&mut self) -> bool {
        let Some(child) = self.node().first_child() else { return false };
        self.stack.push((child, 0));
        true
    }

    pub fn goto_next_sibling(&mut self) -> bool {
        let [.., (parent, _), (_, index)] = &self.stack[..] else { return false };
        let index = *index + 1;
        let Some(sibling) = parent.child(index) else { return false };
        self.stack.pop();
        self.stack.push((sibling, index));
        true
    }

    pub fn goto_parent(&mut self) -> bool {
        if self.stack.len() > 1 {
            self.stack.pop();
            true
        } else {
            false
        }
    }

    /// Moves to the first child that extends past `offset`, returning its index.
    pub fn goto_first_child_for_byte(&mut self, offset: TextSize) -> Option<usize> {
        let (index, child) =
            self.node().children().enumerate().find(|(_, child)| child.end_byte() > offset)?;
        self.stack.push((child, index));
        Some(index)
    }

    pub fn preorder(self) -> Preorder<'tree> {
        Preorder { cursor: self, state: PreorderState::Start, skip_subtree: false }
    }
}

/// One step of a pre-order walk.
#[derive(Clone, Copy, Debug)]
pub struct Visit<'tree> {
    pub node: Node<'tree>,
    pub depth: usize,
    pub field_name: Option<&'tree str>,
    /// Parent within the walk; `None` for the node the walk started on.
    pub parent: Option<Node<'tree>>,
    /// Index among the parent's children.
    pub index: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum PreorderState {
    Start,
    Walking,
    Done,
}

/// Pre-order traversal that reports depth and field names.
#[derive(Clone)]
pub struct Preorder<'tree> {
    cursor: TreeCursor<'tree>,
    state: PreorderState,
    skip_subtree: bool,
}

impl Preorder<'_> {
    /// Does not descend into the node returned last.
    pub fn skip_subtree(&mut self) {
        self.skip_subtree = true;
    }
}

impl<'tree> Iterator for Preorder<'tree> {
    type Item = Visit<'tree>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            PreorderState::Done => return None,
            PreorderState::Start => self.state = PreorderState::Walking,
            PreorderState::Walking => {
                let skip = std::mem::take(&mut self.skip_subtree);
                if skip || !self.cursor.goto_first_child() {
                    while !self.cursor.goto_next_sibling() {
                        if !self.cursor.goto_parent() {
                            self.state = PreorderState::Done;
                            return None;
                        }
                    }
                }
            }
        }

        Some(Visit {
            node: self.cursor.node(),
            depth: self.cursor.depth(),
            field_name: self.cursor.field_name(),
            parent: self.cursor.parent(),
            index: self.cursor.child_index(),
        })
    }
}
