//! Compiled form of query patterns.

use bramble_table::{FieldId, Symbol};
use bramble_tree::Node;
use text_size::TextSize;

use crate::predicate::Predicate;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Quantifier {
    One,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

impl Quantifier {
    pub(crate) fn allows_many(self) -> bool {
        matches!(self, Self::ZeroOrMore | Self::OneOrMore)
    }
}

/// Which nodes a node pattern accepts, before looking at children.
#[derive(Debug)]
pub(crate) enum NodeTest {
    /// `_`
    Any,
    /// `(_)`
    Named,
    /// `(kind)` or `"literal"`; several symbols can share a name.
    Symbols(Vec<Symbol>),
    /// `(ERROR)`; the unrecognized tokens inside error nodes are left out.
    Error,
    /// `(MISSING)` or `(MISSING kind)`
    Missing(Option<Vec<Symbol>>),
}

impl NodeTest {
    pub(crate) fn matches(&self, node: Node<'_>) -> bool {
        match self {
            Self::Any => true,
            Self::Named => node.is_named(),
            Self::Symbols(symbols) => symbols.contains(&node.kind_id()),
            Self::Error => node.is_error() && node.child_count() > 0,
            Self::Missing(symbols) => {
                node.is_missing()
                    && symbols.as_ref().is_none_or(|symbols| symbols.contains(&node.kind_id()))
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct NodePattern {
    pub(crate) test: NodeTest,
    pub(crate) children: Sequence,
    /// `!field`: the node has no child with this field.
    pub(crate) negated_fields: Vec<FieldId>,
}

/// Patterns matched against consecutive runs of siblings.
#[derive(Debug, Default)]
pub(crate) struct Sequence {
    pub(crate) elements: Vec<Element>,
    /// A trailing `.`: no named sibling may follow the last element.
    pub(crate) anchored_end: bool,
}

#[derive(Debug)]
pub(crate) struct Element {
    pub(crate) item: Item,
    pub(crate) field: Option<FieldId>,
    pub(crate) quantifier: Quantifier,
    /// A preceding `.`: no named sibling may be skipped to reach the match.
    pub(crate) anchored: bool,
}

#[derive(Debug)]
pub(crate) struct Item {
    pub(crate) pattern: Pattern,
    pub(crate) captures: Vec<u32>,
}

#[derive(Debug)]
pub(crate) enum Pattern {
    Node(NodePattern),
    /// `[...]`: the first alternative that matches wins.
    Alternation(Vec<Item>),
    /// `(...)` without a node name: siblings matched in order.
    Group(Sequence),
}

impl Pattern {
    pub(crate) fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }
}

/// One top-level pattern of a query.
#[derive(Debug)]
pub(crate) struct QueryPattern {
    pub(crate) root: Item,
    pub(crate) predicates: Vec<Predicate>,
    pub(crate) start: TextSize,
}
