//! Immutable, reference-counted tree storage.
//!
//! A `Subtree` knows its length but not its position, so identical subtrees
//! can be shared between tree versions no matter where an edit moved them.

use std::cmp::Ordering;
use std::fmt;

use bramble_table::{LexMode, ProductionId, StateId, Symbol};
use text_size::TextSize;
use triomphe::Arc;

use crate::{ExternalState, Length};

/// Cost of one error recovery.
pub const ERROR_COST_PER_RECOVERY: u32 = 500;
/// Cost of a token inserted by recovery.
pub const ERROR_COST_PER_MISSING_TREE: u32 = 110;
/// Cost of a subtree wrapped in an `ERROR` node.
pub const ERROR_COST_PER_SKIPPED_TREE: u32 = 100;
pub const ERROR_COST_PER_SKIPPED_LINE: u32 = 30;
pub const ERROR_COST_PER_SKIPPED_CHAR: u32 = 1;

#[derive(Clone, Copy, PartialEq, Eq, Default)]
struct Flags(u8);

impl Flags {
    const LEAF: u8 = 1 << 0;
    const EXTRA: u8 = 1 << 1;
    const MISSING: u8 = 1 << 2;
    const FRAGILE: u8 = 1 << 3;
    const HAS_CHANGES: u8 = 1 << 4;
    const HAS_EXTERNAL_TOKENS: u8 = 1 << 5;

    #[inline]
    fn contains(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    #[inline]
    fn set(&mut self, flag: u8, value: bool) {
        if value {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
    }
}

#[derive(Clone)]
struct SubtreeData {
    symbol: Symbol,
    size: Length,
    /// Bytes past the end that were examined while this subtree was built.
    lookahead_bytes: u32,
    /// Parse state on top of the stack when this subtree was pushed.
    parse_state: StateId,
    lex_mode: LexMode,
    flags: Flags,
    error_cost: u32,
    dynamic_precedence: i32,
    production_id: ProductionId,
    descendant_count: u32,
    external_state: ExternalState,
    children: Box<[Subtree]>,
}

/// A node of the syntax tree, without a position.
#[derive(Clone)]
pub struct Subtree(Arc<SubtreeData>);

impl Subtree {
    /// Creates a token.
    pub fn leaf(
        symbol: Symbol,
        size: Length,
        lookahead_bytes: u32,
        parse_state: StateId,
        lex_mode: LexMode,
    ) -> Self {
        let error_cost = if symbol == Symbol::ERROR {
            ERROR_COST_PER_SKIPPED_CHAR * u32::from(size.bytes)
                + ERROR_COST_PER_SKIPPED_LINE * size.extent.row
        } else {
            0
        };
        Self(Arc::new(SubtreeData {
            symbol,
            size,
            lookahead_bytes,
            parse_state,
            lex_mode,
            flags: Flags(Flags::LEAF),
            error_cost,
            dynamic_precedence: 0,
            production_id: ProductionId::default(),
            descendant_count: 0,
            external_state: ExternalState::default(),
            children: Box::default(),
        }))
    }

    /// Creates a zero-width token inserted by error recovery.
    pub fn missing(symbol: Symbol, parse_state: StateId, lex_mode: LexMode) -> Self {
        let mut subtree = Self::leaf(symbol, Length::ZERO, 0, parse_state, lex_mode);
        let data = subtree.data_mut();
        data.flags.set(Flags::MISSING, true);
        data.error_cost = ERROR_COST_PER_MISSING_TREE + ERROR_COST_PER_RECOVERY;
        subtree
    }

    /// Creates an inner node, summarizing its children.
    pub fn node(
        symbol: Symbol,
        children: Vec<Self>,
        production_id: ProductionId,
        dynamic_precedence: i32,
        parse_state: StateId,
    ) -> Self {
        let mut subtree = Self(Arc::new(SubtreeData {
            symbol,
            size: Length::ZERO,
            lookahead_bytes: 0,
            parse_state,
            lex_mode: LexMode::default(),
            flags: Flags::default(),
            error_cost: 0,
            dynamic_precedence,
            production_id,
            descendant_count: 0,
            external_state: ExternalState::default(),
            children: children.into_boxed_slice(),
        }));
        subtree.summarize();
        subtree
    }

    /// Creates an `ERROR` node around subtrees the parser could not use.
    pub fn error(children: Vec<Self>, parse_state: StateId) -> Self {
        let mut subtree =
            Self::node(Symbol::ERROR, children, ProductionId::default(), 0, parse_state);
        let data = subtree.data_mut();
        let skipped_trees = data.children.iter().filter(|child| !child.is_extra()).count() as u32;
        data.error_cost += ERROR_COST_PER_RECOVERY
            + ERROR_COST_PER_SKIPPED_CHAR * u32::from(data.size.bytes)
            + ERROR_COST_PER_SKIPPED_LINE * data.size.extent.row
            + ERROR_COST_PER_SKIPPED_TREE * skipped_trees;
        subtree
    }

    fn data_mut(&mut self) -> &mut SubtreeData {
        Arc::make_mut(&mut self.0)
    }

    fn summarize(&mut self) {
        let data = self.data_mut();
        let mut size = Length::ZERO;
        let mut lookahead_end = TextSize::new(0);
        let mut error_cost = 0;
        let mut dynamic_precedence = data.dynamic_precedence;
        let mut descendant_count = 0;
        let mut fragile = false;
        let mut external = false;

        for child in &data.children {
            size += child.size();
            lookahead_end = lookahead_end.max(size.bytes + TextSize::new(child.lookahead_bytes()));
            error_cost += child.error_cost();
            dynamic_precedence += child.dynamic_precedence();
            descendant_count += child.descendant_count() + 1;
            fragile |= child.is_fragile();
            external |= child.has_external_tokens();
        }

        data.size = size;
        data.lookahead_bytes = u32::from(lookahead_end.checked_sub(size.bytes).unwrap_or_default());
        data.error_cost = error_cost;
        data.dynamic_precedence = dynamic_precedence;
        data.descendant_count = descendant_count;
        data.flags.set(Flags::FRAGILE, fragile);
        data.flags.set(Flags::HAS_EXTERNAL_TOKENS, external);
    }

    /// Attaches the scanner state serialized after this external token.
    #[must_use]
    pub fn with_external_state(mut self, state: ExternalState) -> Self {
        let data = self.data_mut();
        data.external_state = state;
        data.flags.set(Flags::HAS_EXTERNAL_TOKENS, true);
        self
    }

    #[must_use]
    pub fn into_extra(mut self) -> Self {
        self.data_mut().flags.set(Flags::EXTRA, true);
        self
    }

    /// Marks a subtree built while several parse versions were alive.
    #[must_use]
    pub fn into_fragile(mut self) -> Self {
        self.data_mut().flags.set(Flags::FRAGILE, true);
        self
    }

    /// Widens the lookahead so that it reaches at least `bytes` past the end.
    #[must_use]
    pub fn with_min_lookahead(mut self, bytes: u32) -> Self {
        if bytes > self.lookahead_bytes() {
            self.data_mut().lookahead_bytes = bytes;
        }
        self
    }

    #[must_use]
    pub fn with_parse_state(mut self, state: StateId) -> Self {
        if self.parse_state() != state {
            self.data_mut().parse_state = state;
        }
        self
    }

    /// Rebuilds this node with new children and the given size.
    pub(crate) fn edited(&self, size: Length, children: Option<Vec<Self>>) -> Self {
        let mut data = SubtreeData::clone(&self.0);
        data.size = size;
        data.flags.set(Flags::HAS_CHANGES, true);
        if let Some(children) = children {
            data.children = children.into_boxed_slice();
        }
        Self(Arc::new(data))
    }

    /// Returns a copy whose children are replaced, keeping the node's kind.
    #[must_use]
    pub fn with_children(&self, children: Vec<Self>) -> Self {
        let inherited: i32 = self.children().iter().map(Self::dynamic_precedence).sum();
        let own_precedence = self.dynamic_precedence() - inherited;
        let subtree = if self.is_error() {
            Self::error(children, self.parse_state())
        } else {
            Self::node(
                self.symbol(),
                children,
                self.production_id(),
                own_precedence,
                self.parse_state(),
            )
        };
        if self.is_extra() { subtree.into_extra() } else { subtree }
    }

    #[inline]
    pub fn symbol(&self) -> Symbol {
        self.0.symbol
    }

    #[inline]
    pub fn size(&self) -> Length {
        self.0.size
    }

    #[inline]
    pub fn lookahead_bytes(&self) -> u32 {
        self.0.lookahead_bytes
    }

    #[inline]
    pub fn parse_state(&self) -> StateId {
        self.0.parse_state
    }

    #[inline]
    pub fn lex_mode(&self) -> LexMode {
        self.0.lex_mode
    }

    #[inline]
    pub fn children(&self) -> &[Self] {
        &self.0.children
    }

    #[inline]
    pub fn child_count(&self) -> usize {
        self.0.children.len()
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.0.flags.contains(Flags::LEAF)
    }

    #[inline]
    pub fn is_extra(&self) -> bool {
        self.0.flags.contains(Flags::EXTRA)
    }

    #[inline]
    pub fn is_missing(&self) -> bool {
        self.0.flags.contains(Flags::MISSING)
    }

    #[inline]
    pub fn is_fragile(&self) -> bool {
        self.0.flags.contains(Flags::FRAGILE)
    }

    #[inline]
    pub fn has_changes(&self) -> bool {
        self.0.flags.contains(Flags::HAS_CHANGES)
    }

    #[inline]
    pub fn has_external_tokens(&self) -> bool {
        self.0.flags.contains(Flags::HAS_EXTERNAL_TOKENS)
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.0.symbol == Symbol::ERROR
    }

    #[inline]
    pub fn has_error(&self) -> bool {
        self.0.error_cost > 0
    }

    #[inline]
    pub fn error_cost(&self) -> u32 {
        self.0.error_cost
    }

    #[inline]
    pub fn dynamic_precedence(&self) -> i32 {
        self.0.dynamic_precedence
    }

    #[inline]
    pub fn production_id(&self) -> ProductionId {
        self.0.production_id
    }

    /// Number of nodes below this one.
    #[inline]
    pub fn descendant_count(&self) -> u32 {
        self.0.descendant_count
    }

    #[inline]
    pub fn external_state(&self) -> &ExternalState {
        &self.0.external_state
    }

    /// Returns the last external token in this subtree.
    pub fn last_external_token(&self) -> Option<&Self> {
        if !self.has_external_tokens() {
            return None;
        }
        let mut subtree = self;
        while !subtree.is_leaf() {
            subtree = subtree.children().iter().rev().find(|child| child.has_external_tokens())?;
        }
        Some(subtree)
    }

    /// Returns the first token of this subtree, or itself when it has no children.
    pub fn first_leaf(&self) -> &Self {
        let mut subtree = self;
        while let Some(first) = subtree.children().first() {
            subtree = first;
        }
        subtree
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Total order used to pick between equally ranked parses.
    pub fn compare(&self, other: &Self) -> Ordering {
        if self.ptr_eq(other) {
            return Ordering::Equal;
        }
        self.symbol()
            .cmp(&other.symbol())
            .then_with(|| self.child_count().cmp(&other.child_count()))
            .then_with(|| {
                self.children()
                    .iter()
                    .zip(other.children())
                    .map(|(left, right)| left.compare(right))
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(Ordering::Equal)
            })
    }
}

/// Structural equality: kind, size, flags that show up in the tree, and children.
impl PartialEq for Subtree {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        self.symbol() == other.symbol()
            && self.size() == other.size()
            && self.is_extra() == other.is_extra()
            && self.is_missing() == other.is_missing()
            && self.production_id() == other.production_id()
            && self.children() == other.children()
    }
}

impl Eq for Subtree {}

impl fmt::Debug for Subtree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tuple = f.debug_tuple("Subtree");
        tuple.field(&self.symbol()).field(&self.size());
        if !self.children().is_empty() {
            tuple.field(&self.children());
        }
        tuple.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(symbol: u16, text: &str) -> Subtree {
        let size = Length::of(text.as_bytes());
        Subtree::leaf(Symbol::new(symbol), size, 1, StateId::START, LexMode::default())
    }

    #[test]
    fn nodes_summarize_children() {
        let node = Subtree::node(
            Symbol::new(7),
            vec![token(1, "12"), token(2, "\n"), token(1, "3")],
            ProductionId::new(0),
            2,
            StateId::START,
        );
        assert_eq!(node.size(), Length::of(b"12\n3"));
        assert_eq!(node.descendant_count(), 3);
        assert_eq!(node.dynamic_precedence(), 2);
        assert_eq!(node.lookahead_bytes(), 1);
        assert!(!node.has_error());
    }

    #[test]
    fn errors_are_costed() {
        let missing = Subtree::missing(Symbol::new(1), StateId::START, LexMode::default());
        assert!(missing.is_missing() && missing.size().is_empty());
        assert_eq!(missing.error_cost(), ERROR_COST_PER_MISSING_TREE + ERROR_COST_PER_RECOVERY);

        let error = Subtree::error(vec![token(1, "ab")], StateId::START);
        assert_eq!(
            error.error_cost(),
            ERROR_COST_PER_RECOVERY + 2 * ERROR_COST_PER_SKIPPED_CHAR + ERROR_COST_PER_SKIPPED_TREE
        );
        assert!(error.is_error() && error.has_error());
    }

    #[test]
    fn structural_equality_ignores_sharing() {
        let node = |state| {
            Subtree::node(Symbol::new(7), vec![token(1, "1")], ProductionId::new(3), 0, state)
        };
        let left = node(StateId::START);
        let right = node(StateId::new(4));
        assert_eq!(left, right);
        assert_ne!(left, token(1, "1"));
        assert_eq!(left.compare(&right), Ordering::Equal);
        assert_eq!(token(1, "1").compare(&left), Ordering::Less);
    }
}
