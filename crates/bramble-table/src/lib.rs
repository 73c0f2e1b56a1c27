//! Immutable grammar tables that drive lexing and parsing.
//!
//! A [`Language`] is loaded once from its serialized table, validated, and
//! then shared read-only between every parse of that language.

mod action;
mod error;
mod language;
mod lex;
mod load;
mod raw;
mod symbol;

/// Parse actions, productions and field bindings.
pub use action::{FieldEntry, ParseAction, Production};
/// Failure to load a grammar table.
pub use error::GrammarLoadError;
/// The loaded grammar.
pub use language::Language;
/// Lexical automata selected by parse states.
pub use lex::{LexMode, LexTable};
/// Identifiers and metadata for grammar symbols.
pub use symbol::{Associativity, FieldId, ProductionId, StateId, Symbol, SymbolInfo, SymbolKind};

/// Table format version understood by this runtime.
pub const ABI_VERSION: u32 = 1;
