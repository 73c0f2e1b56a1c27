use std::cmp::Ordering;
use std::ops::Index;

use bramble_table::StateId;
use bramble_tree::{ExternalState, Length, Subtree};
use la_arena::{Arena, Idx};

pub(crate) type NodeId = Idx<StackNode>;

/// One entry of the parse stack.
///
/// Entries are never removed during a parse. A version is just the index of
/// its top entry, so forking copies an index and popping moves it down.
#[derive(Debug)]
pub(crate) struct StackNode {
    pub(crate) state: StateId,
    pub(crate) position: Length,
    /// Subtree pushed to reach this entry; `None` at the bottom.
    pub(crate) subtree: Option<Subtree>,
    pub(crate) prev: Option<NodeId>,
    /// Error cost of every subtree from the bottom up to this entry.
    pub(crate) error_cost: u32,
    pub(crate) dynamic_precedence: i32,
    /// Scanner state after the last external token on the stack.
    pub(crate) external_state: ExternalState,
}

impl StackNode {
    fn is_extra(&self) -> bool {
        self.subtree.as_ref().is_some_and(Subtree::is_extra)
    }
}

/// Subtrees taken off the stack for a reduction.
pub(crate) struct Popped {
    /// Entry the new node is pushed onto.
    pub(crate) base: NodeId,
    pub(crate) children: Vec<Subtree>,
    /// Extras above the last child; they go back on top of the new node.
    pub(crate) trailing_extras: Vec<Subtree>,
}

#[derive(Default)]
pub(crate) struct Stack {
    nodes: Arena<StackNode>,
}

impl Index<NodeId> for Stack {
    type Output = StackNode;

    fn index(&self, id: NodeId) -> &StackNode {
        &self.nodes[id]
    }
}

impl Stack {
    /// Allocates an empty stack in the start state.
    pub(crate) fn base(&mut self) -> NodeId {
        self.nodes.alloc(StackNode {
            state: StateId::START,
            position: Length::ZERO,
            subtree: None,
            prev: None,
            error_cost: 0,
            dynamic_precedence: 0,
            external_state: ExternalState::default(),
        })
    }

    pub(crate) fn push(&mut self, prev: NodeId, subtree: Subtree, state: StateId) -> NodeId {
        let below = &self.nodes[prev];
        let external_state = match subtree.last_external_token() {
            Some(token) => token.external_state().clone(),
            None => below.external_state.clone(),
        };
        let node = StackNode {
            state,
            position: below.position + subtree.size(),
            error_cost: below.error_cost + subtree.error_cost(),
            dynamic_precedence: below.dynamic_precedence + subtree.dynamic_precedence(),
            prev: Some(prev),
            subtree: Some(subtree),
            external_state,
        };
        self.nodes.alloc(node)
    }

    /// Walks from `head` down to the bottom entry.
    pub(crate) fn iter(&self, head: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(head), |&id| self.nodes[id].prev)
    }

    /// Subtrees on the stack, bottom first.
    pub(crate) fn subtrees(&self, head: NodeId) -> Vec<Subtree> {
        let mut subtrees: Vec<_> =
            self.iter(head).filter_map(|id| self.nodes[id].subtree.clone()).collect();
        subtrees.reverse();
        subtrees
    }

    /// Subtrees pushed after `base`, bottom first.
    pub(crate) fn subtrees_above(&self, base: NodeId, head: NodeId) -> Vec<Subtree> {
        let mut subtrees: Vec<_> = self
            .iter(head)
            .take_while(|&id| id != base)
            .filter_map(|id| self.nodes[id].subtree.clone())
            .collect();
        subtrees.reverse();
        subtrees
    }

    /// States reached by non-extra subtrees, bottom first, starting with the
    /// start state.
    pub(crate) fn states(&self, head: NodeId) -> Vec<StateId> {
        let mut states: Vec<_> = self
            .iter(head)
            .filter(|&id| !self.nodes[id].is_extra())
            .map(|id| self.nodes[id].state)
            .collect();
        states.reverse();
        states
    }

    /// Pops `count` non-extra subtrees, with the extras between them.
    ///
    /// Returns `None` when the stack is not deep enough.
    pub(crate) fn pop(&self, head: NodeId, count: usize) -> Option<Popped> {
        let mut children = Vec::with_capacity(count);
        let mut trailing_extras = Vec::new();
        let mut remaining = count;
        let mut base = head;
        while remaining > 0 {
            let node = &self.nodes[base];
            let subtree = node.subtree.clone()?;
            if !subtree.is_extra() {
                remaining -= 1;
                children.push(subtree);
            } else if children.is_empty() {
                trailing_extras.push(subtree);
            } else {
                children.push(subtree);
            }
            base = node.prev?;
        }
        children.reverse();
        trailing_extras.reverse();
        Some(Popped { base, children, trailing_extras })
    }

    /// Whether both stacks pass through the same states, ignoring extras.
    pub(crate) fn same_states(&self, left: NodeId, right: NodeId) -> bool {
        let mut left = Some(self.skip_extras(left));
        let mut right = Some(self.skip_extras(right));
        loop {
            match (left, right) {
                (Some(l), Some(r)) if l == r => return true,
                (Some(l), Some(r)) => {
                    let (l, r) = (&self.nodes[l], &self.nodes[r]);
                    if l.state != r.state {
                        return false;
                    }
                    left = l.prev.map(|id| self.skip_extras(id));
                    right = r.prev.map(|id| self.skip_extras(id));
                }
                (None, None) => return true,
                _ => return false,
            }
        }
    }

    fn skip_extras(&self, mut id: NodeId) -> NodeId {
        while self.nodes[id].is_extra()
            && let Some(prev) = self.nodes[id].prev
        {
            id = prev;
        }
        id
    }

    /// Orders two stacks by their subtrees, top first.
    pub(crate) fn compare(&self, left: NodeId, right: NodeId) -> Ordering {
        let mut left = self.iter(left);
        let mut right = self.iter(right);
        loop {
            match (left.next(), right.next()) {
                (Some(l), Some(r)) if l == r => return Ordering::Equal,
                (Some(l), Some(r)) => {
                    let ordering = match (&self.nodes[l].subtree, &self.nodes[r].subtree) {
                        (Some(l), Some(r)) => l.compare(r),
                        (l, r) => l.is_some().cmp(&r.is_some()),
                    };
                    if ordering.is_ne() {
                        return ordering;
                    }
                }
                (l, r) => return l.is_some().cmp(&r.is_some()),
            }
        }
    }
}
