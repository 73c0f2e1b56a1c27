use bramble_table::{Language, LexMode, LexTable, Symbol};
use bramble_tree::{ExternalState, Length};
use regex_automata::dfa::Automaton;

use crate::{ExternalScanner, ScanCursor, TextSource};

/// A token produced by the [`Lexer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub symbol: Symbol,
    pub size: Length,
    /// Bytes past the end of the token that were examined to produce it.
    pub lookahead_bytes: u32,
    /// Scanner state after an external token; `None` for regular tokens.
    pub external_state: Option<ExternalState>,
}

impl Token {
    pub fn is_error(&self) -> bool {
        self.symbol == Symbol::ERROR
    }
}

/// Tokenizer driven by the lexical modes of a [`Language`].
///
/// The lexer keeps no position of its own: each call lexes one token at the
/// given position, so parse versions at different positions can share it.
pub struct Lexer<'a> {
    language: &'a Language,
    input: &'a mut dyn TextSource,
    scanner: Option<Box<dyn ExternalScanner>>,
    buffer: Vec<u8>,
}

impl<'a> Lexer<'a> {
    pub fn new(
        language: &'a Language,
        input: &'a mut dyn TextSource,
        scanner: Option<Box<dyn ExternalScanner>>,
    ) -> Self {
        Self { language, input, scanner, buffer: Vec::new() }
    }

    /// Lexes one token at `position`.
    ///
    /// The external scanner runs first when `mode` allows external tokens,
    /// `allow_external` is set and a scanner is present; it starts from
    /// `external_state`. Otherwise, or when it declines, end of input yields
    /// [`Symbol::END`] and anything else goes through the mode's automaton.
    /// If that matches nothing the automaton accepting every terminal is
    /// tried, and failing that a one-byte [`Symbol::ERROR`] token is produced.
    pub fn lex(
        &mut self,
        position: Length,
        mode: LexMode,
        external_state: &ExternalState,
        allow_external: bool,
    ) -> Token {
        if allow_external
            && mode.external_lex_state != 0
            && let Some(token) = self.lex_external(position, mode, external_state)
        {
            return token;
        }

        if self.byte(position).is_none() {
            return Token {
                symbol: Symbol::END,
                size: Length::ZERO,
                lookahead_bytes: 1,
                external_state: None,
            };
        }

        let language = self.language;
        let (found, examined_end) = self.run(language.lex_table(mode.lex_state), position);
        let (found, examined_end) = match found {
            Some(found) => (Some(found), examined_end),
            None if mode.lex_state != language.error_lex_state() => {
                let (found, fallback_end) =
                    self.run(language.lex_table(language.error_lex_state()), position);
                (found, examined_end.max(fallback_end))
            }
            None => (None, examined_end),
        };

        let (symbol, end) = match found {
            Some(found) => found,
            None => {
                let end = self.byte(position).map_or(position, |byte| position.advance(byte));
                log::trace!("lex: no token matches at {}", u32::from(position.bytes));
                (Symbol::ERROR, end)
            }
        };
        Token {
            symbol,
            size: end - position,
            lookahead_bytes: lookahead(examined_end, end),
            external_state: None,
        }
    }

    fn lex_external(
        &mut self,
        position: Length,
        mode: LexMode,
        external_state: &ExternalState,
    ) -> Option<Token> {
        let language = self.language;
        let scanner = self.scanner.as_mut()?;
        let valid = language.external_valid_tokens(mode.external_lex_state);
        if !valid.contains(&true) {
            return None;
        }

        scanner.deserialize(external_state.as_bytes());
        let mut cursor = ScanCursor::new(&mut *self.input, position);
        let index = scanner.scan(&mut cursor, valid)?;
        if !valid.get(index).copied().unwrap_or(false) {
            log::debug!("external scanner returned invalid token {index}");
            return None;
        }
        let symbol = *language.external_symbols().get(index)?;
        let end = cursor.token_end();
        let examined_end = cursor.examined_end();

        self.buffer.clear();
        scanner.serialize(&mut self.buffer);
        Some(Token {
            symbol,
            size: end - position,
            lookahead_bytes: lookahead(examined_end, end),
            external_state: Some(ExternalState::new(&self.buffer)),
        })
    }

    /// Runs one automaton from `position`, returning the longest match and
    /// one past the last examined byte offset.
    ///
    /// Matches are reported one byte late, so a match state entered after
    /// consuming the byte at `at` describes a token ending at `at`.
    fn run(&mut self, table: &LexTable, position: Length) -> (Option<(Symbol, Length)>, usize) {
        let dfa = table.dfa();
        let mut state = table.start_state();
        let mut at = position;
        let mut found = None;

        loop {
            let Some(byte) = self.byte(at) else {
                state = dfa.next_eoi_state(state);
                if dfa.is_match_state(state) {
                    found = Some((table.matched_symbol(state), at));
                }
                return (found, usize::from(at.bytes) + 1);
            };

            state = dfa.next_state(state, byte);
            if dfa.is_match_state(state) && at.bytes > position.bytes {
                found = Some((table.matched_symbol(state), at));
            }
            let next = at.advance(byte);
            if dfa.is_dead_state(state) || dfa.is_quit_state(state) {
                return (found, usize::from(next.bytes));
            }
            at = next;
        }
    }

    fn byte(&mut self, at: Length) -> Option<u8> {
        self.input.read(usize::from(at.bytes), at.extent).first().copied()
    }
}

fn lookahead(examined_end: usize, token_end: Length) -> u32 {
    let end = usize::from(token_end.bytes);
    u32::try_from(examined_end.saturating_sub(end)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use bramble_table::StateId;

    use super::*;
    use crate::builtin_scanner;

    fn language(name: &str) -> Language {
        let table = match name {
            "arithmetic" => {
                include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../grammars/arithmetic.json"))
            }
            "statements" => {
                include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../grammars/statements.json"))
            }
            _ => include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../grammars/outline.json")),
        };
        Language::from_json(table.as_bytes()).unwrap()
    }

    /// Lexes `text` from the start in the lex mode of parse state 0.
    fn tokens(language: &Language, text: &str) -> Vec<(String, u32, u32)> {
        let mut input = text.as_bytes();
        let mut lexer = Lexer::new(language, &mut input, None);
        let mode = language.lex_mode(StateId::START);
        let mut position = Length::ZERO;
        let mut tokens = Vec::new();
        loop {
            let token = lexer.lex(position, mode, &ExternalState::default(), true);
            let name = language.symbol_name(token.symbol).to_owned();
            tokens.push((name, u32::from(token.size.bytes), token.lookahead_bytes));
            if token.symbol == Symbol::END {
                return tokens;
            }
            position += token.size;
        }
    }

    #[test]
    fn longest_match_with_lookahead() {
        let language = language("arithmetic");
        let tokens = tokens(&language, "12 +3");
        let sizes: Vec<_> = tokens.iter().map(|(name, size, _)| (name.as_str(), *size)).collect();
        assert_eq!(sizes, [("number", 2), ("whitespace", 1), ("+", 1), ("number", 1), ("end", 0)]);
        // Every token looked at least at the byte after it.
        assert!(tokens.iter().all(|&(_, _, lookahead)| lookahead >= 1));
        // At the end of input only the end itself was examined.
        assert_eq!(tokens[3].2, 1);
        assert_eq!(tokens[4].2, 1);
    }

    #[test]
    fn unknown_bytes_become_error_tokens() {
        let language = language("arithmetic");
        let tokens = tokens(&language, "1?\u{ff}");
        let names: Vec<_> = tokens.iter().map(|(name, size, _)| (name.as_str(), *size)).collect();
        assert_eq!(names, [("number", 1), ("ERROR", 1), ("ERROR", 1), ("ERROR", 1), ("end", 0)]);
    }

    #[test]
    fn falls_back_to_every_terminal() {
        let language = language("statements");
        let tokens = tokens(&language, "x = 1; # note");
        let names: Vec<_> = tokens.iter().map(|(name, ..)| name.as_str()).collect();
        assert_eq!(
            names,
            [
                "identifier",
                "whitespace",
                "=",
                "whitespace",
                "number",
                ";",
                "whitespace",
                "comment",
                "end"
            ]
        );
    }

    #[test]
    fn external_tokens_carry_scanner_state() {
        let language = language("outline");
        let (factory, _) = builtin_scanner("indentation").unwrap();
        let text = "a\n  b";
        let mut input = text.as_bytes();
        let mut lexer = Lexer::new(&language, &mut input, Some(factory()));

        let newline_mode = LexMode { lex_state: 0, external_lex_state: 1 };
        let token = lexer.lex(Length::of(b"a"), newline_mode, &ExternalState::default(), true);
        assert_eq!(language.symbol_name(token.symbol), "newline");
        assert_eq!(token.size, Length::of(b"\n  "));
        assert_eq!(token.external_state, Some(ExternalState::default()));

        let indent_mode = LexMode { lex_state: 0, external_lex_state: 2 };
        let token = lexer.lex(Length::of(b"a\n  "), indent_mode, &ExternalState::default(), true);
        assert_eq!(language.symbol_name(token.symbol), "indent");
        assert!(token.size.is_empty());
        assert_eq!(token.external_state, Some(ExternalState::new(&[2, 0])));

        let token = lexer.lex(Length::of(b"a\n  "), indent_mode, &ExternalState::default(), false);
        assert_eq!(language.symbol_name(token.symbol), "identifier");
    }
}
