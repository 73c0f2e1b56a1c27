//! Structural matching of compiled patterns.
//!
//! Matching is written in continuation-passing style: each step calls `k`
//! once for every way it can match and undoes its captures afterwards. A
//! continuation returns `Break` to stop the enumeration.

use std::ops::ControlFlow;

use bramble_table::FieldId;
use bramble_tree::Node;

use crate::QueryCapture;
use crate::pattern::{Element, Item, NodePattern, Pattern, Quantifier, QueryPattern, Sequence};

type Flow = ControlFlow<()>;
type Captures<'tree> = Vec<QueryCapture<'tree>>;

#[derive(Clone, Copy)]
pub(crate) struct Sibling<'tree> {
    pub(crate) node: Node<'tree>,
    field: Option<FieldId>,
}

pub(crate) fn siblings(parent: Node<'_>) -> Vec<Sibling<'_>> {
    parent
        .children()
        .enumerate()
        .map(|(index, node)| Sibling { node, field: parent.field_for_child(index) })
        .collect()
}

/// Named nodes that are not extras; anchors may not skip over these.
fn is_significant(node: Node<'_>) -> bool {
    node.is_named() && !node.is_extra()
}

/// Siblings a step may pass over before its match.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Skip {
    Nothing,
    Insignificant,
    Anything,
}

/// Calls `k` for every match of `pattern` that starts at `node`.
///
/// `position` holds the node's siblings and its index among them; group
/// patterns match nothing else when it is `None`.
pub(crate) fn match_pattern<'tree>(
    pattern: &QueryPattern,
    node: Node<'tree>,
    position: Option<(&[Sibling<'tree>], usize)>,
    captures: &mut Captures<'tree>,
    k: &mut dyn FnMut(&mut Captures<'tree>) -> Flow,
) -> Flow {
    let Pattern::Group(sequence) = &pattern.root.pattern else {
        return match_item(&pattern.root, node, captures, k);
    };
    let lone = [Sibling { node, field: None }];
    let (siblings, index) = position.unwrap_or((&lone, 0));
    match_sequence(sequence, 0, siblings, index, Skip::Nothing, captures, &mut |_, captures| {
        k(captures)
    })
}

fn match_item<'tree>(
    item: &Item,
    node: Node<'tree>,
    captures: &mut Captures<'tree>,
    k: &mut dyn FnMut(&mut Captures<'tree>) -> Flow,
) -> Flow {
    let mark = captures.len();
    captures.extend(item.captures.iter().map(|&index| QueryCapture { node, index }));
    let flow = match &item.pattern {
        Pattern::Node(pattern) => match_node(pattern, node, captures, k),
        Pattern::Alternation(alternatives) => {
            let mut flow = ControlFlow::Continue(());
            for alternative in alternatives {
                let mut matched = false;
                flow = match_item(alternative, node, captures, &mut |captures| {
                    matched = true;
                    k(captures)
                });
                if matched || flow.is_break() {
                    break;
                }
            }
            flow
        }
        Pattern::Group(_) => ControlFlow::Continue(()),
    };
    captures.truncate(mark);
    flow
}

fn match_node<'tree>(
    pattern: &NodePattern,
    node: Node<'tree>,
    captures: &mut Captures<'tree>,
    k: &mut dyn FnMut(&mut Captures<'tree>) -> Flow,
) -> Flow {
    let has_field = |field: FieldId| node.children_by_field_id(field).next().is_some();
    if !pattern.test.matches(node) || pattern.negated_fields.iter().copied().any(has_field) {
        return ControlFlow::Continue(());
    }
    let children = &pattern.children;
    if children.elements.is_empty() && !children.anchored_end {
        return k(captures);
    }
    let siblings = siblings(node);
    match_sequence(children, 0, &siblings, 0, Skip::Anything, captures, &mut |_, captures| {
        k(captures)
    })
}

/// Matches `sequence.elements[index..]` against `siblings[position..]` and
/// passes the position after the last match to `k`.
fn match_sequence<'tree>(
    sequence: &Sequence,
    index: usize,
    siblings: &[Sibling<'tree>],
    position: usize,
    skip: Skip,
    captures: &mut Captures<'tree>,
    k: &mut dyn FnMut(usize, &mut Captures<'tree>) -> Flow,
) -> Flow {
    let Some(element) = sequence.elements.get(index) else {
        if sequence.anchored_end
            && siblings[position..].iter().any(|sibling| is_significant(sibling.node))
        {
            return ControlFlow::Continue(());
        }
        return k(position, captures);
    };
    let skip = if element.anchored { skip.min(Skip::Insignificant) } else { skip };
    match_element(element, siblings, position, skip, captures, &mut |end, captures| {
        match_sequence(sequence, index + 1, siblings, end, Skip::Anything, captures, k)
    })
}

/// Matches one element with its quantifier.
///
/// A quantified element takes the longest run it can: the run starts at the
/// first sibling that matches and continues over following matches, passing
/// only insignificant siblings. Shorter runs are not tried.
fn match_element<'tree>(
    element: &Element,
    siblings: &[Sibling<'tree>],
    position: usize,
    skip: Skip,
    captures: &mut Captures<'tree>,
    k: &mut dyn FnMut(usize, &mut Captures<'tree>) -> Flow,
) -> Flow {
    if element.quantifier == Quantifier::One {
        return match_single(element, siblings, position, skip, captures, k);
    }
    let mark = captures.len();
    let mut end = position;
    let mut count = 0;
    let mut skip = skip;
    while count == 0 || element.quantifier.allows_many() {
        match first_single(element, siblings, end, skip, captures) {
            Some(next) if next > end => end = next,
            _ => break,
        }
        count += 1;
        skip = Skip::Insignificant;
    }
    let flow = if count == 0 && element.quantifier == Quantifier::OneOrMore {
        ControlFlow::Continue(())
    } else {
        k(end, captures)
    };
    captures.truncate(mark);
    flow
}

/// Keeps the captures of the first match of `element` and returns where it
/// ended.
fn first_single<'tree>(
    element: &Element,
    siblings: &[Sibling<'tree>],
    position: usize,
    skip: Skip,
    captures: &mut Captures<'tree>,
) -> Option<usize> {
    let mut found = None;
    let _ = match_single(element, siblings, position, skip, captures, &mut |end, captures| {
        found = Some((end, captures.clone()));
        ControlFlow::Break(())
    });
    let (end, matched) = found?;
    *captures = matched;
    Some(end)
}

fn match_single<'tree>(
    element: &Element,
    siblings: &[Sibling<'tree>],
    position: usize,
    skip: Skip,
    captures: &mut Captures<'tree>,
    k: &mut dyn FnMut(usize, &mut Captures<'tree>) -> Flow,
) -> Flow {
    if let Pattern::Group(sequence) = &element.item.pattern {
        return match_sequence(sequence, 0, siblings, position, skip, captures, k);
    }
    for (index, sibling) in siblings.iter().enumerate().skip(position) {
        if element.field.is_none_or(|field| sibling.field == Some(field)) {
            match_item(&element.item, sibling.node, captures, &mut |captures| {
                k(index + 1, captures)
            })?;
        }
        let stop = match skip {
            Skip::Nothing => true,
            Skip::Insignificant => is_significant(sibling.node),
            Skip::Anything => false,
        };
        if stop {
            break;
        }
    }
    ControlFlow::Continue(())
}
