use std::sync::LazyLock;

use bramble_table::Language;
use bramble_tree::{InputEdit, Tree};
use expect_test::{Expect, expect};
use text_size::TextRange;

use crate::{Parser, ParserConfig};

static ARITHMETIC: LazyLock<Language> = LazyLock::new(|| {
    let table =
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../grammars/arithmetic.json"));
    Language::from_json(table.as_bytes()).unwrap()
});

static STATEMENTS: LazyLock<Language> = LazyLock::new(|| {
    let table =
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../grammars/statements.json"));
    Language::from_json(table.as_bytes()).unwrap()
});

static OUTLINE: LazyLock<Language> = LazyLock::new(|| {
    let table = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../grammars/outline.json"));
    Language::from_json(table.as_bytes()).unwrap()
});

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn parse(language: &Language, text: &str) -> Tree {
    init_logger();
    Parser::new(language.clone()).parse(text, None)
}

fn check(language: &Language, text: &str, expect: Expect) {
    let tree = parse(language, text);
    assert_eq!(tree.len(), text.len().try_into().unwrap());
    expect.assert_eq(&tree.to_sexp());
}

#[test]
fn left_associative_sums() {
    check(
        &ARITHMETIC,
        "1+2+3",
        expect![[r#"(expr left: (expr left: (expr (number)) right: (expr (number))) right: (expr (number)))"#]],
    );
}

#[test]
fn precedence_decides_nesting() {
    check(
        &ARITHMETIC,
        "1 * 2 + 3",
        expect![[r#"(expr left: (expr left: (expr (number)) right: (expr (number))) right: (expr (number)))"#]],
    );
    check(
        &ARITHMETIC,
        "1 + 2 * 3",
        expect![[r#"(expr left: (expr (number)) right: (expr left: (expr (number)) right: (expr (number))))"#]],
    );
    check(&ARITHMETIC, "(1)", expect![[r#"(expr (expr (number)))"#]]);
}

#[test]
fn extras_stay_between_children() {
    let tree = parse(&ARITHMETIC, "1 + 2");
    expect![[r#"
        expr@0..5
          left: expr@0..1
            number@0..1
          "whitespace"@1..2 extra
          operator: "+"@2..3
          "whitespace"@3..4 extra
          right: expr@4..5
            number@4..5
    "#]]
    .assert_eq(&tree.debug_dump());
    assert!(!tree.has_error());
}

#[test]
fn surrounding_extras_fold_into_the_root() {
    let tree = parse(&ARITHMETIC, " 1 ");
    let root = tree.root_node();
    assert_eq!(root.byte_range(), TextRange::new(0.into(), 3.into()));
    assert_eq!(root.child_count(), 3);
    assert!(root.child(0).unwrap().is_extra());
    expect![[r#"(expr (number))"#]].assert_eq(&tree.to_sexp());
}

#[test]
fn inserts_missing_tokens() {
    check(
        &ARITHMETIC,
        "1+",
        expect![[r#"(expr left: (expr (number)) right: (expr (MISSING number)))"#]],
    );
    check(
        &ARITHMETIC,
        "1 2",
        expect![[r#"(expr left: (expr (number)) operator: (MISSING "+") right: (expr (number)))"#]],
    );
    check(
        &STATEMENTS,
        "x = ; y = 2;",
        expect![[r#"(program (program (program) (statement name: (identifier) value: (expression (MISSING identifier)))) (statement name: (identifier) value: (expression (number))))"#]],
    );
}

#[test]
fn skips_unusable_tokens() {
    let tree = parse(&ARITHMETIC, "1)");
    expect![[r#"(expr (number) (ERROR))"#]].assert_eq(&tree.to_sexp());
    assert!(tree.has_error());

    let tree = parse(&STATEMENTS, "x = 1 ?? ;");
    expect![[r#"(program (program) (statement name: (identifier) value: (expression (number)) (ERROR)))"#]]
        .assert_eq(&tree.to_sexp());
    let error = tree.preorder().map(|visit| visit.node).find(|node| node.is_error()).unwrap();
    assert_eq!(error.byte_range(), TextRange::new(6.into(), 8.into()));
    assert_eq!(error.child_count(), 2);
    assert!(error.is_extra());
}

#[test]
fn empty_input() {
    check(&STATEMENTS, "", expect![[r#"(program)"#]]);
    let tree = parse(&ARITHMETIC, "");
    expect![[r#"(expr (MISSING number))"#]].assert_eq(&tree.to_sexp());
    assert!(tree.is_empty() && tree.has_error());
}

#[test]
fn ambiguity_forks_and_merges() {
    init_logger();
    let mut parser = Parser::new(STATEMENTS.clone());
    let tree = parser.parse("x y z;", None);
    expect![[r#"(program (program) (statement value: (expression (expression (identifier)) (expression (expression (identifier)) (expression (identifier))))))"#]]
        .assert_eq(&tree.to_sexp());
    assert!(parser.stats().forks >= 1);
    assert!(parser.stats().merges >= 1);
    assert!(!tree.has_error());
}

#[test]
fn indentation_tokens_come_from_the_scanner() {
    check(
        &OUTLINE,
        "a\n  b\nc",
        expect![[r#"(list (list (item name: (identifier) body: (list (item name: (identifier))))) (item name: (identifier)))"#]],
    );
}

#[test]
fn reparse_reuses_unchanged_subtrees() {
    init_logger();
    let mut parser = Parser::new(ARITHMETIC.clone());
    let tree = parser.parse("1 + 2", None);

    let edit = InputEdit::from_replacement("1 + 2", TextRange::new(0.into(), 1.into()), "11");
    let reparsed = parser.reparse("11 + 2", &tree, &[edit]);
    assert_eq!(parser.stats().reused, 4);
    assert_eq!(reparsed, parse(&ARITHMETIC, "11 + 2"));
    assert!(reparsed.root_node().child(4).unwrap().subtree().ptr_eq(&tree.root().children()[4]));
}

#[test]
fn reparse_matches_a_fresh_parse() {
    init_logger();
    let mut parser = Parser::new(ARITHMETIC.clone());
    let tree = parser.parse("1", None);
    let edit = InputEdit::from_replacement("1", TextRange::empty(1.into()), "1");
    let reparsed = parser.reparse("11", &tree, &[edit]);
    assert_eq!(reparsed, parse(&ARITHMETIC, "11"));

    let tree = parser.parse("1 + 2", None);
    let first = InputEdit::from_replacement("1 + 2", TextRange::new(4.into(), 5.into()), "2 * 3");
    let second =
        InputEdit::from_replacement("1 + 2 * 3", TextRange::new(0.into(), 1.into()), "(7)");
    let reparsed = parser.reparse("(7) + 2 * 3", &tree, &[first, second]);
    assert_eq!(reparsed, parse(&ARITHMETIC, "(7) + 2 * 3"));
    expect![[r#"(expr left: (expr (expr (number))) right: (expr left: (expr (number)) right: (expr (number))))"#]]
        .assert_eq(&reparsed.to_sexp());
}

#[test]
fn nodes_built_for_missing_tokens_are_rebuilt() {
    init_logger();
    let mut parser = Parser::new(ARITHMETIC.clone());
    let tree = parser.parse("(1", None);
    expect![[r#"(expr (expr (number)) (MISSING ")"))"#]].assert_eq(&tree.to_sexp());

    let edit = InputEdit::from_replacement("(1", TextRange::empty(0.into()), "(");
    let reparsed = parser.reparse("((1", &tree, &[edit]);
    assert_eq!(reparsed, parse(&ARITHMETIC, "((1"));
}

#[test]
fn tokens_after_a_column_shift_are_scanned_again() {
    init_logger();
    let mut parser = Parser::new(OUTLINE.clone());
    let tree = parser.parse("a\n\na", None);
    let edit = InputEdit::from_replacement("a\n\na", TextRange::new(2.into(), 3.into()), " ");
    let reparsed = parser.reparse("a\n a", &tree, &[edit]);
    assert_eq!(reparsed, parse(&OUTLINE, "a\n a"));
    expect![[r#"(list (item name: (identifier) body: (list (item name: (identifier)))))"#]]
        .assert_eq(&reparsed.to_sexp());
}

#[test]
fn reuse_can_be_turned_off() {
    init_logger();
    let mut parser =
        Parser::new(ARITHMETIC.clone()).with_config(ParserConfig::default().reuse_subtrees(false));
    let tree = parser.parse("1 + 2", None);
    let edit = InputEdit::from_replacement("1 + 2", TextRange::new(0.into(), 1.into()), "3");
    let reparsed = parser.reparse("3 + 2", &tree, &[edit]);
    assert_eq!(parser.stats().reused, 0);
    assert_eq!(reparsed, parse(&ARITHMETIC, "3 + 2"));
}

#[test]
fn single_version_still_parses_ambiguities() {
    init_logger();
    let config = ParserConfig::default().max_versions(1);
    let mut parser = Parser::new(STATEMENTS.clone()).with_config(config);
    let tree = parser.parse("a b c d;", None);
    assert!(!tree.has_error());
    assert_eq!(tree.root_node().byte_range(), TextRange::new(0.into(), 8.into()));
}
