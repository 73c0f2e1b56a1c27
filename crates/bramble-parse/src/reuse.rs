use bramble_table::{Language, StateId};
use bramble_tree::{ExternalState, Subtree};
use text_size::TextSize;

struct Entry {
    subtree: Subtree,
    start: TextSize,
    /// Position among the parent's children.
    index: usize,
}

/// Pre-order cursor over the previous tree that hands out subtrees the
/// parser can push without re-parsing them.
///
/// Positions handed to [`ReusableNode::find`] must never decrease.
pub(crate) struct ReusableNode {
    stack: Vec<Entry>,
    /// Scanner state after the last external token that was passed.
    preceding_external: ExternalState,
}

impl ReusableNode {
    pub(crate) fn new(root: Subtree) -> Self {
        Self {
            stack: vec![Entry { subtree: root, start: TextSize::new(0), index: 0 }],
            preceding_external: ExternalState::default(),
        }
    }

    /// Returns the largest reusable subtree starting at `position`.
    pub(crate) fn find(
        &mut self,
        language: &Language,
        position: TextSize,
        state: StateId,
        external_state: &ExternalState,
    ) -> Option<Subtree> {
        while let Some(entry) = self.stack.last() {
            let start = entry.start;
            let end = start + entry.subtree.size().bytes;
            if start > position {
                return None;
            }
            if end <= position {
                self.advance();
                continue;
            }
            if start < position || !self.can_reuse(&entry.subtree, language, state, external_state)
            {
                if !self.descend() {
                    self.advance();
                }
                continue;
            }
            return Some(entry.subtree.clone());
        }
        None
    }

    fn can_reuse(
        &self,
        subtree: &Subtree,
        language: &Language,
        state: StateId,
        external_state: &ExternalState,
    ) -> bool {
        if subtree.has_changes()
            || subtree.has_error()
            || subtree.is_missing()
            || subtree.is_fragile()
            || subtree.size().is_empty()
            || *external_state != self.preceding_external
            || subtree.first_leaf().lex_mode() != language.lex_mode(state)
        {
            return false;
        }
        let symbol = subtree.symbol();
        if subtree.is_leaf() {
            language.is_extra(symbol) || !language.actions(state, symbol).is_empty()
        } else {
            !subtree.is_extra()
                && subtree.parse_state() == state
                && language.goto(state, symbol).is_some()
        }
    }

    fn descend(&mut self) -> bool {
        let Some(entry) = self.stack.last() else {
            return false;
        };
        let Some(first) = entry.subtree.children().first().cloned() else {
            return false;
        };
        let start = entry.start;
        self.stack.push(Entry { subtree: first, start, index: 0 });
        true
    }

    /// Moves past the current subtree.
    fn advance(&mut self) {
        let Some(mut entry) = self.stack.pop() else {
            return;
        };
        if let Some(token) = entry.subtree.last_external_token() {
            self.preceding_external = token.external_state().clone();
        }
        loop {
            let end = entry.start + entry.subtree.size().bytes;
            let index = entry.index + 1;
            let next = self.stack.last().and_then(|parent| parent.subtree.children().get(index));
            if let Some(next) = next.cloned() {
                self.stack.push(Entry { subtree: next, start: end, index });
                return;
            }
            match self.stack.pop() {
                Some(parent) => entry = parent,
                None => return,
            }
        }
    }
}
