use bramble_table::Language;
use text_size::TextSize;

use crate::QueryError;
use crate::compile::{Compiled, compile};
use crate::pattern::QueryPattern;

/// Compiled s-expression patterns for one language.
///
/// ```text
/// (statement name: (identifier) @name value: (expression (number)))
/// ((comment) @doc . (statement) @item)
/// ((identifier) @name (#match? @name "^_"))
/// ```
#[derive(Debug)]
pub struct Query {
    language: Language,
    pub(crate) patterns: Vec<QueryPattern>,
    capture_names: Vec<String>,
}

impl Query {
    pub fn new(language: &Language, source: &str) -> Result<Self, QueryError> {
        let Compiled { patterns, capture_names } = compile(language, source)?;
        log::debug!("compiled {} query patterns", patterns.len());
        Ok(Self { language: language.clone(), patterns, capture_names })
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Offset of the pattern in the query text.
    pub fn start_byte_for_pattern(&self, index: usize) -> Option<TextSize> {
        self.patterns.get(index).map(|pattern| pattern.start)
    }

    /// Capture names, indexed by [`QueryCapture::index`](crate::QueryCapture::index).
    pub fn capture_names(&self) -> &[String] {
        &self.capture_names
    }

    pub fn capture_name(&self, index: u32) -> Option<&str> {
        self.capture_names.get(index as usize).map(String::as_str)
    }

    pub fn capture_index_for_name(&self, name: &str) -> Option<u32> {
        self.capture_names.iter().position(|known| known == name).map(|index| index as u32)
    }
}
