//! Incremental parsing driven by serialized grammar tables.
//!
//! [`load_language`] turns a table into a [`LanguageHandle`], which parses
//! text into [`Tree`]s, re-parses them after edits and compiles [`Query`]s.

use std::fmt;

pub use bramble_errors::{Diagnostic, Renderer, syntax_errors};
use bramble_lexer::builtin_scanner;
pub use bramble_lexer::{
    Chunked, ExternalScanner, IndentationScanner, ScanCursor, ScannerFactory, TextSource,
};
pub use bramble_parse::{ParseStats, Parser, ParserConfig};
pub use bramble_query::{
    Query, QueryCapture, QueryCaptures, QueryCursor, QueryError, QueryErrorKind, QueryMatch,
    QueryMatches,
};
pub use bramble_table::{GrammarLoadError, Language};
pub use bramble_tree::{InputEdit, Node, Point, Range, StaleTree, Tree, TreeCursor};

/// Loads a grammar table and attaches the external scanner it names.
///
/// Fails when the table is malformed, names a scanner the runtime does not
/// ship, or declares external tokens the scanner does not produce.
pub fn load_language(blob: &[u8]) -> Result<LanguageHandle, GrammarLoadError> {
    let language = Language::from_json(blob)?;
    let declared = language.external_symbols().len();
    let scanner = match language.external_scanner() {
        Some(name) => {
            let (factory, produced) = builtin_scanner(name)
                .ok_or_else(|| GrammarLoadError::UnknownScanner(name.to_owned()))?;
            check_token_count(name, produced, declared)?;
            log::debug!("grammar `{}` uses the `{name}` scanner", language.name());
            Some(factory)
        }
        None if declared > 0 => return Err(GrammarLoadError::MissingScanner),
        None => None,
    };
    Ok(LanguageHandle { language, scanner, scanner_name: None })
}

fn check_token_count(name: &str, produced: usize, declared: usize) -> Result<(), GrammarLoadError> {
    if produced == declared {
        return Ok(());
    }
    Err(GrammarLoadError::ScannerMismatch {
        scanner: name.to_owned(),
        expected: produced,
        found: declared,
    })
}

/// A loaded language together with its external scanner.
///
/// Handles are cheap to clone and can be shared between threads; every
/// parse gets its own scanner instance.
#[derive(Clone)]
pub struct LanguageHandle {
    language: Language,
    scanner: Option<ScannerFactory>,
    /// Set when the scanner was supplied by the caller.
    scanner_name: Option<String>,
}

impl LanguageHandle {
    /// Replaces the external scanner with one supplied by the caller.
    ///
    /// `token_count` is the number of tokens the scanner produces; it must
    /// match the external tokens the grammar declares.
    pub fn with_scanner(
        mut self,
        name: impl Into<String>,
        factory: ScannerFactory,
        token_count: usize,
    ) -> Result<Self, GrammarLoadError> {
        let name = name.into();
        check_token_count(&name, token_count, self.language.external_symbols().len())?;
        self.scanner = Some(factory);
        self.scanner_name = Some(name);
        Ok(self)
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn name(&self) -> &str {
        self.language.name()
    }

    /// A parser with default settings.
    pub fn parser(&self) -> Parser {
        self.parser_with(ParserConfig::default())
    }

    pub fn parser_with(&self, config: ParserConfig) -> Parser {
        let parser = Parser::new(self.language.clone()).with_config(config);
        match &self.scanner {
            Some(factory) => parser.with_scanner(factory.clone()),
            None => parser,
        }
    }

    /// Parses `text` from scratch. Never fails: syntax errors are part of
    /// the returned tree.
    pub fn parse(&self, text: impl AsRef<[u8]>) -> Tree {
        self.parser().parse(text.as_ref(), None)
    }

    /// Re-parses `text` after `edits` were applied, in order, to the text
    /// `tree` was parsed from.
    pub fn reparse(&self, text: impl AsRef<[u8]>, tree: &Tree, edits: &[InputEdit]) -> Tree {
        self.parser().reparse(text.as_ref(), tree, edits)
    }

    pub fn query(&self, source: &str) -> Result<Query, QueryError> {
        Query::new(&self.language, source)
    }
}

impl fmt::Debug for LanguageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let builtin = self.language.external_scanner();
        f.debug_struct("LanguageHandle")
            .field("language", &self.language.name())
            .field("scanner", &self.scanner_name.as_deref().or(builtin))
            .finish()
    }
}
