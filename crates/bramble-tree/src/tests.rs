use std::sync::LazyLock;

use bramble_table::{Language, LexMode, ProductionId, StateId, Symbol};
use expect_test::expect;
use text_size::{TextRange, TextSize};

use crate::{InputEdit, Length, Node, Subtree, Tree};

const NUMBER: Symbol = Symbol::new(1);
const PLUS: Symbol = Symbol::new(2);
const STAR: Symbol = Symbol::new(3);
const WHITESPACE: Symbol = Symbol::new(6);
const EXPR: Symbol = Symbol::new(7);

static ARITHMETIC: LazyLock<Language> = LazyLock::new(|| {
    let table =
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../grammars/arithmetic.json"));
    Language::from_json(table.as_bytes()).unwrap()
});

fn arithmetic() -> Language {
    ARITHMETIC.clone()
}

fn token(symbol: Symbol, text: &str) -> Subtree {
    Subtree::leaf(symbol, Length::of(text.as_bytes()), 1, StateId::START, LexMode::default())
}

fn number(text: &str) -> Subtree {
    Subtree::node(EXPR, vec![token(NUMBER, text)], ProductionId::new(3), 0, StateId::START)
}

/// `left op right` with a space on each side of the operator.
fn binary(left: Subtree, operator: Symbol, right: Subtree) -> Subtree {
    let text = if operator == PLUS { "+" } else { "*" };
    let children = vec![
        left,
        token(WHITESPACE, " ").into_extra(),
        token(operator, text),
        token(WHITESPACE, " ").into_extra(),
        right,
    ];
    Subtree::node(EXPR, children, ProductionId::new(0), 0, StateId::START)
}

fn one_plus_two() -> Tree {
    Tree::new(binary(number("1"), PLUS, number("2")), arithmetic())
}

#[test]
fn debug_dump() {
    let tree = one_plus_two();
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
    expect![[r#"(expr left: (expr (number)) right: (expr (number)))"#]].assert_eq(&tree.to_sexp());
}

#[test]
fn missing_nodes_in_sexp() {
    let missing = Subtree::missing(NUMBER, StateId::START, LexMode::default());
    let right = Subtree::node(EXPR, vec![missing], ProductionId::new(3), 0, StateId::START);
    let tree = Tree::new(binary(number("1"), PLUS, right), arithmetic());

    expect![[r#"(expr left: (expr (number)) right: (expr (MISSING number)))"#]]
        .assert_eq(&tree.to_sexp());
    assert!(tree.has_error());
    assert!(tree.root_node().child(4).unwrap().has_error());
    assert!(!tree.root_node().child(0).unwrap().has_error());
}

#[test]
fn navigation() {
    let tree = one_plus_two();
    let source = b"1 + 2";
    let root = tree.root_node();
    assert_eq!(root.byte_range(), TextRange::new(0.into(), 5.into()));
    assert_eq!(root.child_count(), 5);
    assert_eq!(root.named_child_count(), 2);
    assert!(root.parent().is_none());

    let plus = tree.node_at_byte(2.into());
    assert_eq!(plus.kind(), "+");
    assert!(!plus.is_named());
    assert_eq!(plus.parent(), Some(root));
    assert_eq!(plus.field_name(), Some("operator"));
    assert_eq!(plus.next_sibling().map(Node::is_extra), Some(true));

    let right = root.child_by_field_name("right").unwrap();
    assert_eq!(right.utf8_text(source), Some("2"));
    assert_eq!(right.prev_named_sibling(), root.child_by_field_name("left"));
    assert_eq!(right.next_sibling(), None);

    let two = tree.node_at_byte(4.into());
    assert_eq!(two.kind(), "number");
    assert_eq!(two.parent(), Some(right));
    assert_eq!(root.named_descendant_for_byte_range(2.into(), 3.into()), root);
    assert_eq!(tree.node_at_byte(5.into()), two);
}

#[test]
fn cursor_reports_depth_and_fields() {
    let tree = one_plus_two();
    let mut cursor = tree.walk();
    assert!(cursor.goto_first_child());
    assert_eq!((cursor.node().kind(), cursor.depth()), ("expr", 1));
    assert_eq!(cursor.field_name(), Some("left"));
    assert_eq!(cursor.parent(), Some(tree.root_node()));
    assert!(cursor.goto_next_sibling());
    assert_eq!(cursor.field_name(), None);
    assert_eq!(cursor.child_index(), 1);
    assert!(cursor.goto_parent());
    assert!(!cursor.goto_parent());
    assert_eq!(cursor.parent(), None);

    let visits: Vec<_> = tree.preorder().skip(1).take(3).collect();
    for visit in &visits {
        assert_eq!(visit.parent.and_then(|parent| parent.child(visit.index)), Some(visit.node));
    }

    let mut preorder = tree.preorder();
    let mut kinds = Vec::new();
    while let Some(visit) = preorder.next() {
        if visit.field_name == Some("left") {
            preorder.skip_subtree();
        }
        kinds.push(format!("{}{}", " ".repeat(visit.depth), visit.node.kind()));
    }
    assert_eq!(
        kinds,
        ["expr", " expr", " whitespace", " +", " whitespace", " expr", "  number"]
    );
}

#[test]
fn edits_share_untouched_subtrees() {
    let tree = one_plus_two();
    let edit = InputEdit::from_replacement("1 + 2", TextRange::new(0.into(), 1.into()), "11");
    let stale = tree.edit(&edit);

    assert_eq!(tree.len(), TextSize::new(5));
    assert_eq!(stale.tree().len(), TextSize::new(6));
    assert!(stale.root().has_changes());
    assert!(stale.root().children()[4].ptr_eq(&tree.root().children()[4]));
    assert!(stale.tree().root_node().child(0).unwrap().has_changes());

    let edit = InputEdit::from_replacement("11 + 2", TextRange::empty(6.into()), "0");
    let stale = stale.edit(&edit);
    assert_eq!(stale.edits().len(), 2);
    assert_eq!(stale.tree().len(), TextSize::new(7));
    expect![[r#"
        expr@0..7
          left: expr@0..2
            number@0..2
          "whitespace"@2..3 extra
          operator: "+"@3..4
          "whitespace"@4..5 extra
          right: expr@5..7
            number@5..7
    "#]]
    .assert_eq(&stale.tree().debug_dump());
}

#[test]
fn changed_ranges() {
    let tree = one_plus_two();
    let edit = InputEdit::from_replacement("1 + 2", TextRange::new(0.into(), 1.into()), "11");
    let stale = tree.edit(&edit);

    let reparsed = Tree::new(binary(number("11"), PLUS, number("2")), arithmetic());
    assert!(stale.changed_ranges(&reparsed).is_empty());
    assert_ne!(reparsed, tree);

    let reparsed = Tree::new(binary(number("11"), STAR, number("2")), arithmetic());
    let ranges = stale.changed_ranges(&reparsed);
    assert_eq!(ranges.len(), 1);
    assert_eq!(ranges[0].bytes, TextRange::new(3.into(), 4.into()));
}

#[test]
fn structural_equality() {
    assert_eq!(one_plus_two(), one_plus_two());
    let other = Tree::new(binary(number("1"), STAR, number("2")), arithmetic());
    assert_ne!(one_plus_two(), other);
}
