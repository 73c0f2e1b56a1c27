use regex_automata::dfa::{Automaton, StartKind, dense};
use regex_automata::nfa::thompson;
use regex_automata::util::primitives::StateID;
use regex_automata::util::syntax;
use regex_automata::{Anchored, Input, MatchKind};

use crate::{GrammarLoadError, Symbol};

/// Lexical mode of a parse state: which DFA to run and which external
/// tokens the scanner may produce.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LexMode {
    pub lex_state: u16,
    /// Index into the external lex states; 0 means no external tokens.
    pub external_lex_state: u16,
}

/// One anchored, longest-match automaton over a set of terminals.
///
/// Pattern `i` of the automaton produces `symbols[i]`; when several patterns
/// match the same length the one with the lowest index wins.
pub struct LexTable {
    dfa: dense::DFA<Vec<u32>>,
    start: StateID,
    symbols: Box<[Symbol]>,
}

impl LexTable {
    pub(crate) fn build(
        lex_state: u32,
        patterns: &[String],
        symbols: Vec<Symbol>,
    ) -> Result<Self, GrammarLoadError> {
        let dfa = dense::Builder::new()
            .configure(
                dense::DFA::config().match_kind(MatchKind::All).start_kind(StartKind::Anchored),
            )
            .syntax(syntax::Config::new().utf8(false))
            .thompson(thompson::Config::new().utf8(false))
            .build_many(patterns)
            .map_err(|source| GrammarLoadError::InvalidPattern {
                lex_state,
                source: Box::new(source),
            })?;

        let start = dfa
            .start_state_forward(&Input::new(b"").anchored(Anchored::Yes))
            .map_err(|error| GrammarLoadError::Automaton {
                lex_state,
                message: error.to_string(),
            })?;

        if !patterns.is_empty() && dfa.is_match_state(dfa.next_eoi_state(start)) {
            return Err(GrammarLoadError::EmptyMatch(lex_state));
        }

        Ok(Self { dfa, start, symbols: symbols.into_boxed_slice() })
    }

    pub fn dfa(&self) -> &dense::DFA<Vec<u32>> {
        &self.dfa
    }

    pub fn start_state(&self) -> StateID {
        self.start
    }

    /// Returns the symbol of the preferred pattern matched in `state`.
    pub fn matched_symbol(&self, state: StateID) -> Symbol {
        let best = (0..self.dfa.match_len(state))
            .map(|index| self.dfa.match_pattern(state, index).as_usize())
            .min()
            .unwrap_or_default();
        self.symbols[best]
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }
}

impl std::fmt::Debug for LexTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LexTable").field("symbols", &self.symbols).finish_non_exhaustive()
    }
}
