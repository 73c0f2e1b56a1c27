use std::sync::LazyLock;

use bramble_parse::Parser;
use bramble_table::Language;
use bramble_tree::Tree;
use expect_test::{Expect, expect};
use text_size::{TextRange, TextSize};

use crate::{Query, QueryCursor, QueryErrorKind, QueryMatch};

static STATEMENTS: LazyLock<Language> = LazyLock::new(|| {
    let table =
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../grammars/statements.json"));
    Language::from_json(table.as_bytes()).unwrap()
});

const SOURCE: &str = "a = 1;\n# note\nb = a 2;\nc;\n";

fn parse(source: &str) -> Tree {
    Parser::new(STATEMENTS.clone()).parse(source, None)
}

fn render(query: &Query, source: &str, query_match: &QueryMatch<'_>) -> String {
    let captures: Vec<_> = query_match
        .captures
        .iter()
        .map(|capture| {
            let name = query.capture_name(capture.index).unwrap();
            let text = capture.node.utf8_text(source.as_bytes()).unwrap();
            format!("{name} `{text}`")
        })
        .collect();
    format!("{}: {}\n", query_match.pattern_index, captures.join(", "))
}

fn check_in(source: &str, query: &str, expect: Expect) {
    let tree = parse(source);
    let query = Query::new(&STATEMENTS, query).unwrap();
    let actual: String = QueryCursor::new()
        .matches(&query, tree.root_node(), source.as_bytes())
        .map(|query_match| render(&query, source, &query_match))
        .collect();
    expect.assert_eq(&actual);
}

fn check(query: &str, expect: Expect) {
    check_in(SOURCE, query, expect);
}

fn error(query: &str) -> (TextSize, QueryErrorKind) {
    let error = Query::new(&STATEMENTS, query).unwrap_err();
    (error.offset, error.kind)
}

#[test]
fn fields_and_captures() {
    check(
        "(statement name: (identifier) @name value: (expression) @value)",
        expect![[r#"
            0: name `a`, value `1`
            0: name `b`, value `a 2`
        "#]],
    );
    check(
        r#"(statement !name) @bare
"=" @equals"#,
        expect![[r#"
            1: equals `=`
            1: equals `=`
            0: bare `c;`
        "#]],
    );
}

#[test]
fn alternatives_and_quantifiers() {
    check(
        "[(number) @number (identifier) @identifier]",
        expect![[r#"
            0: identifier `a`
            0: number `1`
            0: identifier `b`
            0: identifier `a`
            0: number `2`
            0: identifier `c`
        "#]],
    );
    check(
        "(expression (expression)+ @parts)",
        expect![[r#"
            0: parts `a`, parts `2`
        "#]],
    );
}

#[test]
fn anchors() {
    check(
        "((comment) . (statement) @documented)",
        expect![[r#"
            0: documented `b = a 2;`
        "#]],
    );
    check("((comment) . (identifier) @next)", expect![[""]]);
    check(
        "(expression (_) @last .)",
        expect![[r#"
            0: last `1`
            0: last `2`
            0: last `a`
            0: last `2`
            0: last `c`
        "#]],
    );
}

#[test]
fn groups_match_against_real_siblings() {
    let source = format!("a = 1;\n{}", "# note\nb = a 2;\n".repeat(300));
    let tree = parse(&source);
    let query = Query::new(&STATEMENTS, "((comment) . (statement) @documented)").unwrap();
    let cursor = QueryCursor::new();
    let documented: Vec<_> = cursor
        .matches(&query, tree.root_node(), source.as_bytes())
        .map(|query_match| query_match.captures[0].node)
        .collect();
    assert_eq!(documented.len(), 300);
    assert!(documented.iter().all(|node| node.utf8_text(source.as_bytes()) == Some("b = a 2;")));

    // A walk that starts below the root still sees the start node's siblings.
    let last = documented[299];
    let from_last: Vec<_> = cursor.matches(&query, last, source.as_bytes()).collect();
    assert_eq!(from_last.len(), 1);
    assert_eq!(from_last[0].captures[0].node, last);
}

#[test]
fn predicates() {
    check(
        r#"((identifier) @id (#eq? @id "a"))"#,
        expect![[r#"
            0: id `a`
            0: id `a`
        "#]],
    );
    check(
        r#"((identifier) @id (#match? @id "^[b-z]"))"#,
        expect![[r#"
            0: id `b`
            0: id `c`
        "#]],
    );
    check(
        r#"((identifier) @id (#not-any-of? @id "a" "c"))"#,
        expect![[r#"
            0: id `b`
        "#]],
    );
    check(
        "((statement name: (identifier) @name value: (expression) @value)
          (#eq? @name @value))",
        expect![[""]],
    );
}

#[test]
fn error_and_missing_nodes() {
    check_in(
        "x = ;",
        "(MISSING identifier) @missing\n(statement (expression (MISSING)))@statement",
        expect![[r#"
            1: statement `x = ;`
            0: missing ``
        "#]],
    );
    check_in(
        "x = 1 ?? ;",
        "(ERROR) @error",
        expect![[r#"
            0: error `??`
        "#]],
    );
}

#[test]
fn captures_come_in_document_order() {
    let tree = parse(SOURCE);
    let text = "(statement name: (identifier) @name) @statement\n(number) @number";
    let query = Query::new(&STATEMENTS, text).unwrap();
    let mut actual = String::new();
    let cursor = QueryCursor::new();
    for (query_match, index) in cursor.captures(&query, tree.root_node(), SOURCE.as_bytes()) {
        let capture = query_match.captures[index];
        let name = query.capture_name(capture.index).unwrap();
        let text = capture.node.utf8_text(SOURCE.as_bytes()).unwrap();
        actual.push_str(&format!("{name} `{text}`\n"));
    }
    expect![[r#"
        statement `a = 1;`
        name `a`
        number `1`
        statement `b = a 2;`
        name `b`
        number `2`
    "#]]
    .assert_eq(&actual);
}

#[test]
fn byte_range_and_match_limit() {
    let tree = parse(SOURCE);
    let query = Query::new(&STATEMENTS, "(identifier) @a\n(identifier) @b").unwrap();

    let mut cursor = QueryCursor::new();
    cursor.set_byte_range(TextRange::new(14.into(), 22.into()));
    let starts: Vec<_> = cursor
        .matches(&query, tree.root_node(), SOURCE.as_bytes())
        .map(|query_match| u32::from(query_match.captures[0].node.start_byte()))
        .collect();
    assert_eq!(starts, [14, 14, 18, 18]);

    let mut cursor = QueryCursor::new();
    cursor.set_match_limit(1);
    let mut matches = cursor.matches(&query, tree.root_node(), SOURCE.as_bytes());
    let patterns: Vec<_> = matches.by_ref().map(|query_match| query_match.pattern_index).collect();
    assert_eq!(patterns, [0, 0, 0, 0]);
    assert!(matches.did_exceed_match_limit());
}

#[test]
fn matching_restarts_from_scratch() {
    let tree = parse(SOURCE);
    let query = Query::new(&STATEMENTS, "(statement) @statement").unwrap();
    let cursor = QueryCursor::new();
    let first: Vec<_> = cursor.matches(&query, tree.root_node(), SOURCE.as_bytes()).collect();
    let second: Vec<_> = cursor.matches(&query, tree.root_node(), SOURCE.as_bytes()).collect();
    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
}

#[test]
fn invalid_queries() {
    let unclosed = error("(statement");
    assert_eq!(unclosed, (0.into(), QueryErrorKind::Syntax("unclosed `(`".to_owned())));
    assert_eq!(error("(statement"), unclosed);

    assert_eq!(
        error("(statement (nonsense))"),
        (12.into(), QueryErrorKind::NodeType("nonsense".to_owned()))
    );
    assert_eq!(error("\"nope\""), (0.into(), QueryErrorKind::NodeType("nope".to_owned())));
    assert_eq!(
        error("(statement nope: (identifier))"),
        (11.into(), QueryErrorKind::Field("nope".to_owned()))
    );
    assert_eq!(
        error(r#"((identifier) @id (#eq? @other "x"))"#),
        (24.into(), QueryErrorKind::Capture("other".to_owned()))
    );
    assert_eq!(
        error("((identifier) @id (#frob? @id))"),
        (19.into(), QueryErrorKind::Predicate("unknown predicate `#frob?`".to_owned()))
    );
    assert!(matches!(error("(expression)* @x"), (_, QueryErrorKind::Structure(_))));
    let (_, kind) = error("((identifier) (identifier)) @pair");
    assert!(matches!(kind, QueryErrorKind::Structure(_)));

    let error = Query::new(&STATEMENTS, "(statement)\n  (identifier) @x\n  )").unwrap_err();
    assert_eq!((error.row, error.column), (2, 2));
    expect![[r#"invalid syntax: unexpected `)` at 3:3"#]].assert_eq(&error.to_string());
}
