//! Incremental GLR parsing driven by [`bramble_table`] grammars.
//!
//! A [`Parser`] runs the table's shift/reduce actions and forks stack
//! versions where the table has conflicts. Syntax errors never stop a
//! parse: they are recovered from with `MISSING` and `ERROR` nodes, so the
//! returned tree always covers the whole input. Given an edited previous
//! tree, unchanged subtrees are reused instead of being parsed again.

mod config;
mod parser;
mod reuse;
mod stack;
mod stats;

pub use config::ParserConfig;
pub use parser::Parser;
use reuse::ReusableNode;
pub use stats::ParseStats;

#[cfg(test)]
mod tests;
