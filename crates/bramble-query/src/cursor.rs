use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};
use std::ops::ControlFlow;
use std::rc::Rc;

use bramble_tree::{Node, Preorder};
use text_size::{TextRange, TextSize};

use crate::Query;
use crate::matcher::{Sibling, match_pattern, siblings};

/// A node bound to a capture name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueryCapture<'tree> {
    pub node: Node<'tree>,
    /// Index into [`Query::capture_names`].
    pub index: u32,
}

/// One match of one pattern. Captures are ordered by position, outer nodes
/// before the nodes they contain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryMatch<'tree> {
    pub pattern_index: usize,
    pub captures: Vec<QueryCapture<'tree>>,
}

impl<'tree> QueryMatch<'tree> {
    pub fn nodes_for_capture_index(&self, index: u32) -> impl Iterator<Item = Node<'tree>> + '_ {
        let captures = self.captures.iter().filter(move |capture| capture.index == index);
        captures.map(|capture| capture.node)
    }
}

/// Runs queries over trees.
///
/// A cursor only holds settings, so one cursor can start any number of
/// independent match sequences.
#[derive(Clone, Debug)]
pub struct QueryCursor {
    byte_range: Option<TextRange>,
    match_limit: usize,
}

impl Default for QueryCursor {
    fn default() -> Self {
        Self { byte_range: None, match_limit: usize::MAX }
    }
}

impl QueryCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only looks for matches starting at nodes that intersect `range`.
    pub fn set_byte_range(&mut self, range: TextRange) -> &mut Self {
        self.byte_range = Some(range);
        self
    }

    /// Bounds the number of matches that start at a single node.
    ///
    /// Further matches at that node are dropped and reported through
    /// [`QueryMatches::did_exceed_match_limit`].
    pub fn set_match_limit(&mut self, limit: usize) -> &mut Self {
        self.match_limit = limit.max(1);
        self
    }

    pub fn match_limit(&self) -> usize {
        self.match_limit
    }

    /// Matches in the order of the nodes they start at, then by pattern.
    pub fn matches<'query, 'tree>(
        &self,
        query: &'query Query,
        node: Node<'tree>,
        source: &'query [u8],
    ) -> QueryMatches<'query, 'tree> {
        let groups = query.patterns.iter().any(|pattern| pattern.root.pattern.is_group());
        // Only the starting node needs its parent looked up from the root.
        let start_siblings = groups
            .then(|| node.parent())
            .flatten()
            .and_then(|parent| {
                let siblings = siblings(parent);
                let index = siblings.iter().position(|sibling| sibling.node == node)?;
                Some((siblings, index))
            });
        QueryMatches {
            query,
            source,
            preorder: node.walk().preorder(),
            groups,
            start_siblings,
            ancestors: Vec::new(),
            byte_range: self.byte_range,
            match_limit: self.match_limit,
            pending: VecDeque::new(),
            frontier: node.start_byte(),
            done: false,
            exceeded: false,
        }
    }

    /// Every capture of every match, in document order.
    pub fn captures<'query, 'tree>(
        &self,
        query: &'query Query,
        node: Node<'tree>,
        source: &'query [u8],
    ) -> QueryCaptures<'query, 'tree> {
        let matches = self.matches(query, node, source);
        QueryCaptures { matches, ready: BinaryHeap::new(), seen: 0 }
    }
}

fn overlaps(range: TextRange, node: TextRange) -> bool {
    if range.is_empty() || node.is_empty() {
        node.start() <= range.end() && range.start() <= node.end()
    } else {
        node.start() < range.end() && range.start() < node.end()
    }
}

/// Lazy sequence of matches; nodes are visited only as matches are pulled.
pub struct QueryMatches<'query, 'tree> {
    query: &'query Query,
    source: &'query [u8],
    preorder: Preorder<'tree>,
    /// Whether any pattern is a group, which matches against siblings.
    groups: bool,
    start_siblings: Option<(Vec<Sibling<'tree>>, usize)>,
    ancestors: Ancestors<'tree>,
    byte_range: Option<TextRange>,
    match_limit: usize,
    pending: VecDeque<QueryMatch<'tree>>,
    /// Start of the node tried last; no later match starts before it.
    frontier: TextSize,
    done: bool,
    exceeded: bool,
}

/// Children of each parent on the walk's current path, by depth.
type Ancestors<'tree> = Vec<Option<(Node<'tree>, Vec<Sibling<'tree>>)>>;

/// The children of `parent`, which sits at `depth` of the walk. The list is
/// built once and shared by every child visited under that parent.
fn cached_siblings<'cache, 'tree>(
    cache: &'cache mut Ancestors<'tree>,
    depth: usize,
    parent: Node<'tree>,
) -> &'cache [Sibling<'tree>] {
    cache.truncate(depth + 1);
    cache.resize_with(depth + 1, || None);
    let slot = &mut cache[depth];
    if slot.as_ref().is_none_or(|(cached, _)| *cached != parent) {
        *slot = Some((parent, siblings(parent)));
    }
    match slot {
        Some((_, children)) => children,
        None => &[],
    }
}

impl QueryMatches<'_, '_> {
    pub fn did_exceed_match_limit(&self) -> bool {
        self.exceeded
    }

    /// Tries every pattern at the next node. Returns `false` once the walk
    /// is over.
    fn step(&mut self) -> bool {
        if self.done {
            return false;
        }
        let Some(visit) = self.preorder.next() else {
            self.done = true;
            return false;
        };
        let node = visit.node;
        if let Some(range) = self.byte_range {
            if node.start_byte() > range.end() {
                self.done = true;
                return false;
            }
            if !overlaps(range, node.byte_range()) {
                self.preorder.skip_subtree();
                return true;
            }
        }
        self.frontier = node.start_byte();

        let Self {
            query,
            source,
            pending,
            match_limit,
            exceeded,
            groups,
            start_siblings,
            ancestors,
            ..
        } = self;
        let position = match (*groups, visit.parent) {
            (false, _) => None,
            (true, None) => start_siblings.as_ref().map(|(list, index)| (&list[..], *index)),
            (true, Some(parent)) => {
                let list = cached_siblings(ancestors, visit.depth - 1, parent);
                Some((list, visit.index))
            }
        };
        let mut found = 0;
        let mut captures = Vec::new();
        for (pattern_index, pattern) in query.patterns.iter().enumerate() {
            let flow = match_pattern(pattern, node, position, &mut captures, &mut |captures| {
                if !pattern.predicates.iter().all(|predicate| predicate.holds(captures, source)) {
                    return ControlFlow::Continue(());
                }
                if found == *match_limit {
                    return ControlFlow::Break(());
                }
                let mut captures = captures.clone();
                captures.sort_by_key(|capture| {
                    (capture.node.start_byte(), Reverse(capture.node.end_byte()))
                });
                pending.push_back(QueryMatch { pattern_index, captures });
                found += 1;
                ControlFlow::Continue(())
            });
            if flow.is_break() {
                log::debug!("match limit {match_limit} reached at {:?}", node.byte_range());
                *exceeded = true;
                break;
            }
        }
        true
    }
}

impl<'tree> Iterator for QueryMatches<'_, 'tree> {
    type Item = QueryMatch<'tree>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(query_match) = self.pending.pop_front() {
                return Some(query_match);
            }
            if !self.step() {
                return None;
            }
        }
    }
}

struct PendingCapture<'tree> {
    start: TextSize,
    end: TextSize,
    /// Arrival order, so equal positions keep match order.
    seen: usize,
    capture: usize,
    query_match: Rc<QueryMatch<'tree>>,
}

impl PendingCapture<'_> {
    fn key(&self) -> (TextSize, Reverse<TextSize>, usize, usize) {
        (self.start, Reverse(self.end), self.seen, self.capture)
    }
}

impl PartialEq for PendingCapture<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for PendingCapture<'_> {}

impl PartialOrd for PendingCapture<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingCapture<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Lazy sequence of `(match, capture position in that match)` pairs.
///
/// A capture is handed out once no match found later can contain a capture
/// that comes before it.
pub struct QueryCaptures<'query, 'tree> {
    matches: QueryMatches<'query, 'tree>,
    ready: BinaryHeap<Reverse<PendingCapture<'tree>>>,
    seen: usize,
}

impl QueryCaptures<'_, '_> {
    pub fn did_exceed_match_limit(&self) -> bool {
        self.matches.did_exceed_match_limit()
    }
}

impl<'tree> QueryCaptures<'_, 'tree> {
    fn push(&mut self, query_match: QueryMatch<'tree>) {
        let query_match = Rc::new(query_match);
        for (capture, captured) in query_match.captures.iter().enumerate() {
            self.ready.push(Reverse(PendingCapture {
                start: captured.node.start_byte(),
                end: captured.node.end_byte(),
                seen: self.seen,
                capture,
                query_match: Rc::clone(&query_match),
            }));
        }
        self.seen += 1;
    }
}

impl<'tree> Iterator for QueryCaptures<'_, 'tree> {
    type Item = (QueryMatch<'tree>, usize);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(Reverse(first)) = self.ready.peek()
                && (self.matches.done || first.start < self.matches.frontier)
            {
                let Reverse(first) = self.ready.pop()?;
                return Some((QueryMatch::clone(&first.query_match), first.capture));
            }
            match self.matches.pending.pop_front() {
                Some(query_match) => self.push(query_match),
                None => {
                    if !self.matches.step() && self.ready.is_empty() {
                        return None;
                    }
                }
            }
        }
    }
}
