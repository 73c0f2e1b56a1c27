//! Declarative pattern matching over syntax trees.
//!
//! A [`Query`] is compiled once from s-expression patterns and then run by
//! a [`QueryCursor`] over any tree of the same language. Matching never
//! mutates the tree, and each call to [`QueryCursor::matches`] starts a
//! fresh, finite sequence.

mod compile;
mod cursor;
mod error;
mod matcher;
mod pattern;
mod predicate;
mod query;

pub use cursor::{QueryCapture, QueryCaptures, QueryCursor, QueryMatch, QueryMatches};
pub use error::{QueryError, QueryErrorKind};
pub use query::Query;

#[cfg(test)]
mod tests;
