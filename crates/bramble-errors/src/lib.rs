//! Syntax errors of a parsed tree as renderable diagnostics.

use std::fmt::Display;

pub use annotate_snippets::Renderer;
use annotate_snippets::{Level, Snippet};
use bramble_tree::{Node, Tree};
pub use text_size::TextRange;

/// Longest piece of skipped text quoted in a message, in characters.
const QUOTE_LIMIT: usize = 24;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    message: String,
    range: TextRange,
}

impl Diagnostic {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn range(&self) -> TextRange {
        self.range
    }

    pub fn error(message: impl Into<String>, range: TextRange) -> Self {
        Self { message: message.into(), range }
    }

    pub fn render<'a>(
        &'a self,
        renderer: &'a Renderer,
        path: &'a str,
        text: &'a str,
    ) -> impl Display + 'a {
        let message = Level::Error.title(&self.message).snippet(
            Snippet::source(text)
                .origin(path)
                .annotation(Level::Error.span(self.range.into()).label("here"))
                .fold(true),
        );
        renderer.render(message)
    }
}

/// Collects one diagnostic per `ERROR` node and per `MISSING` token of
/// `tree`, in document order. Errors nested in an `ERROR` node are covered
/// by the diagnostic of the outermost one.
pub fn syntax_errors(tree: &Tree, text: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut preorder = tree.preorder();
    while let Some(visit) = preorder.next() {
        let node = visit.node;
        if !node.has_error() {
            preorder.skip_subtree();
        } else if node.is_missing() {
            let message = format!("missing {}", describe(node));
            diagnostics.push(Diagnostic::error(message, node.byte_range()));
        } else if node.is_error() {
            diagnostics.push(Diagnostic::error(unexpected(node, text), node.byte_range()));
            preorder.skip_subtree();
        }
    }
    diagnostics
}

fn describe(node: Node<'_>) -> String {
    if node.is_named() { node.kind().to_owned() } else { format!("`{}`", node.kind()) }
}

fn unexpected(node: Node<'_>, text: &str) -> String {
    let skipped = node.utf8_text(text.as_bytes()).map_or("", str::trim);
    let Some(line) = skipped.lines().next() else {
        return "unexpected input".to_owned();
    };
    if line.len() == skipped.len() && line.chars().count() <= QUOTE_LIMIT {
        format!("unexpected `{line}`")
    } else {
        let quoted: String = line.chars().take(QUOTE_LIMIT).collect();
        format!("unexpected `{}...`", quoted.trim_end())
    }
}
