use line_index::LineIndex;
use text_size::TextSize;

/// A query that failed to compile, located in the query text.
///
/// `row` and `column` are zero-based; `column` counts bytes.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at {}:{}", .row + 1, .column + 1)]
pub struct QueryError {
    pub offset: TextSize,
    pub row: u32,
    pub column: u32,
    pub kind: QueryErrorKind,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum QueryErrorKind {
    #[error("invalid syntax: {0}")]
    Syntax(String),

    #[error("unknown node type `{0}`")]
    NodeType(String),

    #[error("unknown field `{0}`")]
    Field(String),

    #[error("unknown capture `@{0}`")]
    Capture(String),

    #[error("invalid predicate: {0}")]
    Predicate(String),

    #[error("impossible pattern: {0}")]
    Structure(String),
}

impl QueryError {
    pub(crate) fn new(source: &str, offset: TextSize, kind: QueryErrorKind) -> Self {
        let line_col = LineIndex::new(source).line_col(offset);
        Self { offset, row: line_col.line, column: line_col.col, kind }
    }
}
