use regex::bytes::Regex;

use crate::QueryCapture;

/// A text condition on captured nodes, checked after the pattern matched.
///
/// A capture can hold several nodes when it sits under a quantifier; the
/// condition must then hold for each of them.
#[derive(Debug)]
pub(crate) enum Predicate {
    /// `#eq?` and `#not-eq?`.
    Eq { capture: u32, operand: Operand, negated: bool },
    /// `#match?` and `#not-match?`.
    Match { capture: u32, regex: Regex, negated: bool },
    /// `#any-of?` and `#not-any-of?`.
    AnyOf { capture: u32, values: Vec<String>, negated: bool },
}

#[derive(Debug)]
pub(crate) enum Operand {
    Capture(u32),
    Text(String),
}

impl Predicate {
    pub(crate) fn holds(&self, captures: &[QueryCapture<'_>], source: &[u8]) -> bool {
        let texts = |index: u32| {
            captures
                .iter()
                .filter(move |capture| capture.index == index)
                .map(|capture| text(capture, source))
        };
        match self {
            Self::Eq { capture, operand: Operand::Capture(other), negated } => {
                texts(*capture).eq(texts(*other)) != *negated
            }
            Self::Eq { capture, operand: Operand::Text(value), negated } => {
                texts(*capture).all(|text| (text == value.as_bytes()) != *negated)
            }
            Self::Match { capture, regex, negated } => {
                texts(*capture).all(|text| regex.is_match(text) != *negated)
            }
            Self::AnyOf { capture, values, negated } => texts(*capture).all(|text| {
                values.iter().any(|value| value.as_bytes() == text) != *negated
            }),
        }
    }
}

fn text<'s>(capture: &QueryCapture<'_>, source: &'s [u8]) -> &'s [u8] {
    let range = std::ops::Range::<usize>::from(capture.node.byte_range());
    source.get(range).unwrap_or_default()
}
