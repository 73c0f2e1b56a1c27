use std::sync::LazyLock;

use bramble_parse::Parser;
use bramble_table::Language;
use bramble_tree::{InputEdit, Tree};
use proptest::prelude::*;
use proptest::sample::Index;
use text_size::{TextRange, TextSize};

fn load(table: &str) -> Language {
    Language::from_json(table.as_bytes()).unwrap()
}

static ARITHMETIC: LazyLock<Language> = LazyLock::new(|| {
    load(include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../grammars/arithmetic.json")))
});

static STATEMENTS: LazyLock<Language> = LazyLock::new(|| {
    load(include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../grammars/statements.json")))
});

static OUTLINE: LazyLock<Language> = LazyLock::new(|| {
    load(include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../grammars/outline.json")))
});

fn text(pieces: &'static [&'static str], max: usize) -> impl Strategy<Value = String> {
    let piece = prop_oneof![
        8 => prop::sample::select(pieces).prop_map(str::to_owned),
        1 => "[ -~]",
    ];
    prop::collection::vec(piece, 0..max).prop_map(|pieces| pieces.concat())
}

fn arithmetic_text() -> impl Strategy<Value = String> {
    text(&["1", "23", "+", "*", "(", ")", " "], 24)
}

fn statements_text() -> impl Strategy<Value = String> {
    text(&["x", "y1", "42", "=", ";", " ", "\n"], 24)
}

fn outline_text() -> impl Strategy<Value = String> {
    text(&["a", "b", "\n", "  ", "    "], 24)
}

/// Some text, a range of it, and the text that replaces the range.
fn edited<S: Strategy<Value = String>>(
    text: fn() -> S,
) -> impl Strategy<Value = (String, TextRange, String)> {
    (text(), any::<Index>(), any::<Index>(), text()).prop_map(|(old, start, len, new)| {
        let start = start.index(old.len() + 1);
        let end = start + len.index(old.len() - start + 1);
        (old, TextRange::new(offset(start), offset(end)), new)
    })
}

/// Some text and replacements applied to it one after another. Each
/// replacement picks its range in the text left by the previous ones.
fn edit_sequence<S: Strategy<Value = String>>(
    text: fn() -> S,
) -> impl Strategy<Value = (String, Vec<(Index, Index, String)>)> {
    (text(), prop::collection::vec((any::<Index>(), any::<Index>(), text()), 1..5))
}

fn parse(language: &Language, text: &str) -> Tree {
    Parser::new(language.clone()).parse(text, None)
}

/// Checks that the leaves of `tree` cover `0..len` without gaps or overlaps.
fn assert_leaves_tile(tree: &Tree) -> Result<(), TestCaseError> {
    let mut offset = TextSize::new(0);
    for visit in tree.preorder() {
        let node = visit.node;
        if node.child_count() == 0 {
            prop_assert_eq!(node.byte_range().start(), offset);
            offset = node.byte_range().end();
        }
    }
    prop_assert_eq!(offset, tree.len());
    Ok(())
}

fn assert_reparse_matches(
    language: &Language,
    old: &str,
    range: TextRange,
    replacement: &str,
) -> Result<(), TestCaseError> {
    let mut new = old.to_owned();
    new.replace_range(std::ops::Range::<usize>::from(range), replacement);

    let mut parser = Parser::new(language.clone());
    let tree = parser.parse(old, None);
    let edit = InputEdit::from_replacement(old, range, replacement);
    let reparsed = parser.reparse(&new, &tree, &[edit]);
    let fresh = parse(language, &new);
    prop_assert_eq!(reparsed.to_sexp(), fresh.to_sexp());
    prop_assert_eq!(reparsed, fresh);
    Ok(())
}

/// Re-parses after every replacement in turn, then once more with all of
/// them against the first tree; every result must match a fresh parse.
fn assert_edit_sequence_matches(
    language: &Language,
    old: &str,
    replacements: &[(Index, Index, String)],
) -> Result<(), TestCaseError> {
    let mut parser = Parser::new(language.clone());
    let first = parser.parse(old, None);
    let mut tree = first.clone();
    let mut text = old.to_owned();
    let mut edits = Vec::new();

    for (start, len, replacement) in replacements {
        let start = start.index(text.len() + 1);
        let end = start + len.index(text.len() - start + 1);
        let range = TextRange::new(offset(start), offset(end));
        let edit = InputEdit::from_replacement(&text, range, replacement);
        text.replace_range(start..end, replacement);
        edits.push(edit);

        tree = parser.reparse(&text, &tree, &[edit]);
        let fresh = parse(language, &text);
        prop_assert_eq!(tree.to_sexp(), fresh.to_sexp(), "after editing to {:?}", text);
        prop_assert_eq!(&tree, &fresh);
    }

    let reparsed = parser.reparse(&text, &first, &edits);
    prop_assert_eq!(reparsed, parse(language, &text));
    Ok(())
}

fn offset(offset: usize) -> TextSize {
    TextSize::try_from(offset).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn arithmetic_trees_cover_the_input(source in arithmetic_text()) {
        let tree = parse(&ARITHMETIC, &source);
        prop_assert_eq!(tree.len(), TextSize::of(source.as_str()));
        assert_leaves_tile(&tree)?;
    }

    #[test]
    fn statement_trees_cover_the_input(source in statements_text()) {
        let tree = parse(&STATEMENTS, &source);
        prop_assert_eq!(tree.len(), TextSize::of(source.as_str()));
        assert_leaves_tile(&tree)?;
    }

    #[test]
    fn outline_trees_cover_the_input(source in outline_text()) {
        let tree = parse(&OUTLINE, &source);
        prop_assert_eq!(tree.len(), TextSize::of(source.as_str()));
        assert_leaves_tile(&tree)?;
    }

    #[test]
    fn arithmetic_reparse_matches_a_fresh_parse((old, range, new) in edited(arithmetic_text)) {
        assert_reparse_matches(&ARITHMETIC, &old, range, &new)?;
    }

    #[test]
    fn statement_reparse_matches_a_fresh_parse((old, range, new) in edited(statements_text)) {
        assert_reparse_matches(&STATEMENTS, &old, range, &new)?;
    }

    #[test]
    fn outline_reparse_matches_a_fresh_parse((old, range, new) in edited(outline_text)) {
        assert_reparse_matches(&OUTLINE, &old, range, &new)?;
    }

    #[test]
    fn arithmetic_edit_sequences_match_a_fresh_parse(
        (old, replacements) in edit_sequence(arithmetic_text)
    ) {
        assert_edit_sequence_matches(&ARITHMETIC, &old, &replacements)?;
    }

    #[test]
    fn statement_edit_sequences_match_a_fresh_parse(
        (old, replacements) in edit_sequence(statements_text)
    ) {
        assert_edit_sequence_matches(&STATEMENTS, &old, &replacements)?;
    }

    #[test]
    fn outline_edit_sequences_match_a_fresh_parse(
        (old, replacements) in edit_sequence(outline_text)
    ) {
        assert_edit_sequence_matches(&OUTLINE, &old, &replacements)?;
    }
}
