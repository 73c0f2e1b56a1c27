use bramble_lexer::{Chunked, Lexer, TextSource, Token};
use bramble_table::{Language, StateId, Symbol};
use bramble_tree::{ExternalState, Length, Point};
use proptest::prelude::*;

fn arithmetic() -> Language {
    let table =
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../grammars/arithmetic.json"));
    Language::from_json(table.as_bytes()).unwrap()
}

fn tokenize(language: &Language, input: &mut dyn TextSource) -> Vec<Token> {
    let mut lexer = Lexer::new(language, input, None);
    let mode = language.lex_mode(StateId::START);
    let mut position = Length::ZERO;
    let mut tokens = Vec::new();
    loop {
        let token = lexer.lex(position, mode, &ExternalState::default(), true);
        position += token.size;
        let done = token.symbol == Symbol::END;
        tokens.push(token);
        if done {
            return tokens;
        }
    }
}

fn source_strategy() -> impl Strategy<Value = Vec<u8>> {
    let pieces = prop_oneof![
        Just(b"1".to_vec()),
        Just(b"42".to_vec()),
        Just(b"+".to_vec()),
        Just(b"*".to_vec()),
        Just(b"(".to_vec()),
        Just(b")".to_vec()),
        Just(b" ".to_vec()),
        Just(b"\n".to_vec()),
        any::<u8>().prop_map(|byte| vec![byte]),
    ];
    prop::collection::vec(pieces, 0..40).prop_map(|pieces| pieces.concat())
}

proptest! {
    #[test]
    fn tokens_tile_the_input(source in source_strategy()) {
        let language = arithmetic();
        let tokens = tokenize(&language, &mut source.as_slice());

        let total = tokens.iter().fold(Length::ZERO, |total, token| total + token.size);
        prop_assert_eq!(total, Length::of(&source));
        for token in &tokens[..tokens.len() - 1] {
            prop_assert!(!token.size.is_empty());
            prop_assert!(token.lookahead_bytes >= 1 || token.is_error());
        }
    }

    #[test]
    fn chunked_input_lexes_the_same(source in source_strategy(), chunk in 1usize..8) {
        let language = arithmetic();
        let expected = tokenize(&language, &mut source.as_slice());
        let mut chunked = Chunked::new(|offset: usize, _: Point| {
            let end = source.len().min(offset + chunk);
            source.get(offset..end).unwrap_or_default().to_vec()
        });
        prop_assert_eq!(tokenize(&language, &mut chunked), expected);
    }
}
