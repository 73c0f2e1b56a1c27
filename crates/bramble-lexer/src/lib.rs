//! Tokenization for table-driven parsing.
//!
//! The [`Lexer`] runs the lexical automaton selected by the current parse
//! state, giving an [`ExternalScanner`] the first chance at tokens the
//! automata cannot describe.

mod indentation;
mod input;
mod lexer;
mod registry;
mod scanner;

pub use indentation::IndentationScanner;
pub use input::{Chunked, TextSource};
pub use lexer::{Lexer, Token};
pub use registry::{ScannerFactory, builtin_scanner};
pub use scanner::{ExternalScanner, ScanCursor};
