//! Query text to [`QueryPattern`]s.
//!
//! The text is split into tokens up front and then read by a recursive
//! descent parser. Names are resolved against the language as they are
//! read, so every error points at the token that caused it.

use bramble_table::{FieldId, Language, Symbol};
use regex::bytes::Regex;
use text_size::TextSize;

use crate::pattern::{
    Element, Item, NodePattern, NodeTest, Pattern, Quantifier, QueryPattern, Sequence,
};
use crate::predicate::{Operand, Predicate};
use crate::{QueryError, QueryErrorKind};

type Failure = (TextSize, QueryErrorKind);

#[derive(Clone, Debug, PartialEq, Eq)]
enum TokenKind {
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Dot,
    Star,
    Plus,
    Question,
    String(String),
    Identifier(String),
    /// `name:`
    Field(String),
    /// `!name`
    NegatedField(String),
    /// `@name`
    Capture(String),
    /// `#name?`
    PredicateName(String),
    Eof,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            Self::LeftParen => "`(`".to_owned(),
            Self::RightParen => "`)`".to_owned(),
            Self::LeftBracket => "`[`".to_owned(),
            Self::RightBracket => "`]`".to_owned(),
            Self::Dot => "anchor `.`".to_owned(),
            Self::Star => "`*`".to_owned(),
            Self::Plus => "`+`".to_owned(),
            Self::Question => "`?`".to_owned(),
            Self::String(text) => format!("string {text:?}"),
            Self::Identifier(name) => format!("`{name}`"),
            Self::Field(name) => format!("field `{name}:`"),
            Self::NegatedField(name) => format!("`!{name}`"),
            Self::Capture(name) => format!("capture `@{name}`"),
            Self::PredicateName(name) => format!("predicate `#{name}`"),
            Self::Eof => "end of query".to_owned(),
        }
    }
}

#[derive(Clone, Debug)]
struct Token {
    kind: TokenKind,
    offset: TextSize,
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-')
}

struct Tokenizer<'q> {
    source: &'q str,
    offset: usize,
}

impl<'q> Tokenizer<'q> {
    fn peek(&self) -> Option<char> {
        self.source[self.offset..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.offset += c.len_utf8();
        Some(c)
    }

    fn eat_while(&mut self, f: impl Fn(char) -> bool) -> &'q str {
        let start = self.offset;
        while self.peek().is_some_and(&f) {
            self.bump();
        }
        &self.source[start..self.offset]
    }

    fn trivia(&mut self) {
        loop {
            self.eat_while(char::is_whitespace);
            if self.peek() != Some(';') {
                return;
            }
            self.eat_while(|c| c != '\n');
        }
    }

    fn name(&mut self, offset: TextSize, f: impl Fn(char) -> bool) -> Result<String, Failure> {
        let name = self.eat_while(f);
        if name.is_empty() {
            return Err((offset, QueryErrorKind::Syntax("expected a name".to_owned())));
        }
        Ok(name.to_owned())
    }

    fn string(&mut self, offset: TextSize) -> Result<String, Failure> {
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(text),
                Some('\\') => match self.bump() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('0') => text.push('\0'),
                    Some(c) => text.push(c),
                    None => break,
                },
                Some(c) => text.push(c),
                None => break,
            }
        }
        Err((offset, QueryErrorKind::Syntax("unterminated string".to_owned())))
    }

    fn next_token(&mut self) -> Result<Token, Failure> {
        self.trivia();
        let offset = TextSize::new(self.offset as u32);
        let kind = match self.bump() {
            None => TokenKind::Eof,
            Some('(') => TokenKind::LeftParen,
            Some(')') => TokenKind::RightParen,
            Some('[') => TokenKind::LeftBracket,
            Some(']') => TokenKind::RightBracket,
            Some('.') => TokenKind::Dot,
            Some('*') => TokenKind::Star,
            Some('+') => TokenKind::Plus,
            Some('?') => TokenKind::Question,
            Some('"') => TokenKind::String(self.string(offset)?),
            Some('@') => TokenKind::Capture(self.name(offset, |c| is_name_char(c) || c == '.')?),
            Some('#') => TokenKind::PredicateName(
                self.name(offset, |c| is_name_char(c) || matches!(c, '?' | '!'))?,
            ),
            Some('!') => TokenKind::NegatedField(self.name(offset, is_name_char)?),
            Some(c) if is_name_char(c) => {
                self.offset -= c.len_utf8();
                let name = self.eat_while(is_name_char).to_owned();
                if self.peek() == Some(':') {
                    self.bump();
                    TokenKind::Field(name)
                } else {
                    TokenKind::Identifier(name)
                }
            }
            Some(c) => {
                let message = format!("unexpected character `{c}`");
                return Err((offset, QueryErrorKind::Syntax(message)));
            }
        };
        Ok(Token { kind, offset })
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, Failure> {
    let mut tokenizer = Tokenizer { source, offset: 0 };
    let mut tokens = Vec::new();
    loop {
        let token = tokenizer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

#[derive(Debug)]
enum ArgValue {
    Capture(String),
    Text(String),
}

#[derive(Debug)]
struct Arg {
    value: ArgValue,
    offset: TextSize,
}

/// A predicate whose capture names are resolved once its pattern is read.
#[derive(Debug)]
struct RawPredicate {
    name: String,
    offset: TextSize,
    args: Vec<Arg>,
}

pub(crate) struct Compiled {
    pub(crate) patterns: Vec<QueryPattern>,
    pub(crate) capture_names: Vec<String>,
}

pub(crate) fn compile(language: &Language, source: &str) -> Result<Compiled, QueryError> {
    compile_tokens(language, source).map_err(|(offset, kind)| QueryError::new(source, offset, kind))
}

fn compile_tokens(language: &Language, source: &str) -> Result<Compiled, Failure> {
    let mut parser = Parser {
        language,
        tokens: tokenize(source)?,
        position: 0,
        capture_names: Vec::new(),
        pattern_captures: Vec::new(),
        predicates: Vec::new(),
    };
    let mut patterns = Vec::new();
    while parser.peek().kind != TokenKind::Eof {
        let start = parser.peek().offset;
        let root = parser.top_level()?;
        let predicates = parser.finish_predicates()?;
        parser.pattern_captures.clear();
        patterns.push(QueryPattern { root, predicates, start });
    }
    Ok(Compiled { patterns, capture_names: parser.capture_names })
}

struct Parser<'q> {
    language: &'q Language,
    /// Always ends with [`TokenKind::Eof`].
    tokens: Vec<Token>,
    position: usize,
    capture_names: Vec<String>,
    /// Captures seen in the pattern being read.
    pattern_captures: Vec<u32>,
    predicates: Vec<RawPredicate>,
}

impl Parser<'_> {
    fn peek(&self) -> &Token {
        self.nth(0)
    }

    fn nth(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.position + n).min(last)]
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.position += 1;
        }
        token
    }

    fn top_level(&mut self) -> Result<Item, Failure> {
        let token = self.peek();
        let misplaced = match &token.kind {
            TokenKind::Dot => Some("anchor outside of a pattern"),
            TokenKind::Field(_) | TokenKind::NegatedField(_) => Some("field outside of a pattern"),
            TokenKind::LeftParen if matches!(self.nth(1).kind, TokenKind::PredicateName(_)) => {
                Some("predicate outside of a pattern")
            }
            _ => None,
        };
        let offset = token.offset;
        if let Some(message) = misplaced {
            return Err((offset, QueryErrorKind::Structure(message.to_owned())));
        }

        let element = self.element()?;
        if element.quantifier != Quantifier::One {
            let message = "quantifier on a top-level pattern".to_owned();
            return Err((offset, QueryErrorKind::Structure(message)));
        }
        Ok(element.item)
    }

    fn element(&mut self) -> Result<Element, Failure> {
        let start = self.peek().offset;
        let field = match self.peek().kind.clone() {
            TokenKind::Field(name) => {
                self.bump();
                let field = self.language.field_id_for_name(&name);
                Some(field.ok_or((start, QueryErrorKind::Field(name)))?)
            }
            _ => None,
        };
        let pattern = self.pattern()?;
        let quantifier = match self.peek().kind {
            TokenKind::Star => Quantifier::ZeroOrMore,
            TokenKind::Plus => Quantifier::OneOrMore,
            TokenKind::Question => Quantifier::ZeroOrOne,
            _ => Quantifier::One,
        };
        if quantifier != Quantifier::One {
            self.bump();
        }
        let captures = self.captures();
        if pattern.is_group() && (field.is_some() || !captures.is_empty()) {
            let message = "a group cannot take a field or captures".to_owned();
            return Err((start, QueryErrorKind::Structure(message)));
        }
        Ok(Element { item: Item { pattern, captures }, field, quantifier, anchored: false })
    }

    fn captures(&mut self) -> Vec<u32> {
        let mut captures = Vec::new();
        while let TokenKind::Capture(name) = self.peek().kind.clone() {
            let index = match self.capture_names.iter().position(|known| *known == name) {
                Some(index) => index as u32,
                None => {
                    self.capture_names.push(name);
                    (self.capture_names.len() - 1) as u32
                }
            };
            if !self.pattern_captures.contains(&index) {
                self.pattern_captures.push(index);
            }
            captures.push(index);
            self.bump();
        }
        captures
    }

    fn pattern(&mut self) -> Result<Pattern, Failure> {
        let token = self.bump();
        let offset = token.offset;
        match token.kind {
            TokenKind::LeftParen => self.parenthesized(offset),
            TokenKind::LeftBracket => self.alternation(offset),
            TokenKind::String(text) => {
                let test = NodeTest::Symbols(self.symbols(&text, false, offset)?);
                Ok(Pattern::Node(NodePattern {
                    test,
                    children: Sequence::default(),
                    negated_fields: Vec::new(),
                }))
            }
            TokenKind::Identifier(name) if name == "_" => Ok(Pattern::Node(NodePattern {
                test: NodeTest::Any,
                children: Sequence::default(),
                negated_fields: Vec::new(),
            })),
            TokenKind::Identifier(name) => {
                let message = format!("expected `(` before `{name}`");
                Err((offset, QueryErrorKind::Syntax(message)))
            }
            kind => {
                let message = format!("unexpected {}", kind.describe());
                Err((offset, QueryErrorKind::Syntax(message)))
            }
        }
    }

    fn symbols(&self, name: &str, named: bool, offset: TextSize) -> Result<Vec<Symbol>, Failure> {
        let symbols = self.language.symbols_for_name(name, named);
        if symbols.is_empty() {
            return Err((offset, QueryErrorKind::NodeType(name.to_owned())));
        }
        Ok(symbols.to_vec())
    }

    /// Reads what follows `(`: a node pattern or a group.
    fn parenthesized(&mut self, open: TextSize) -> Result<Pattern, Failure> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Identifier(name) => {
                self.bump();
                let test = match name.as_str() {
                    "_" => NodeTest::Named,
                    "ERROR" => NodeTest::Error,
                    "MISSING" => {
                        let next = self.peek().clone();
                        let symbols = match &next.kind {
                            TokenKind::Identifier(kind) => Some((kind, true)),
                            TokenKind::String(kind) => Some((kind, false)),
                            _ => None,
                        };
                        let symbols = symbols
                            .map(|(kind, named)| self.symbols(kind, named, next.offset))
                            .transpose()?;
                        if symbols.is_some() {
                            self.bump();
                        }
                        NodeTest::Missing(symbols)
                    }
                    _ => NodeTest::Symbols(self.symbols(&name, true, token.offset)?),
                };
                let (children, negated_fields) = self.sequence(open, true)?;
                Ok(Pattern::Node(NodePattern { test, children, negated_fields }))
            }
            TokenKind::RightParen => {
                Err((open, QueryErrorKind::Syntax("empty pattern".to_owned())))
            }
            _ => {
                let (sequence, _) = self.sequence(open, false)?;
                if sequence.elements.is_empty() {
                    let message = "group without patterns".to_owned();
                    return Err((open, QueryErrorKind::Structure(message)));
                }
                Ok(Pattern::Group(sequence))
            }
        }
    }

    /// Reads children up to and including the closing `)`.
    fn sequence(
        &mut self,
        open: TextSize,
        in_node: bool,
    ) -> Result<(Sequence, Vec<FieldId>), Failure> {
        let mut sequence = Sequence::default();
        let mut negated_fields = Vec::new();
        let mut anchored = false;
        loop {
            let token = self.peek().clone();
            match token.kind {
                TokenKind::RightParen => {
                    self.bump();
                    sequence.anchored_end = anchored;
                    return Ok((sequence, negated_fields));
                }
                TokenKind::Eof => {
                    return Err((open, QueryErrorKind::Syntax("unclosed `(`".to_owned())));
                }
                TokenKind::Dot => {
                    self.bump();
                    anchored = true;
                }
                TokenKind::NegatedField(name) if in_node => {
                    self.bump();
                    let field = self.language.field_id_for_name(&name);
                    negated_fields.push(field.ok_or((token.offset, QueryErrorKind::Field(name)))?);
                }
                TokenKind::NegatedField(_) => {
                    let message = "negated field outside of a node pattern".to_owned();
                    return Err((token.offset, QueryErrorKind::Structure(message)));
                }
                TokenKind::LeftParen
                    if matches!(self.nth(1).kind, TokenKind::PredicateName(_)) =>
                {
                    self.predicate()?;
                }
                _ => {
                    let mut element = self.element()?;
                    element.anchored = std::mem::take(&mut anchored);
                    sequence.elements.push(element);
                }
            }
        }
    }

    fn alternation(&mut self, open: TextSize) -> Result<Pattern, Failure> {
        let mut alternatives = Vec::new();
        loop {
            let token = self.peek().clone();
            match token.kind {
                TokenKind::RightBracket => {
                    self.bump();
                    break;
                }
                TokenKind::Eof => {
                    return Err((open, QueryErrorKind::Syntax("unclosed `[`".to_owned())));
                }
                _ => {}
            }
            let start = token.offset;
            let element = self.element()?;
            if element.field.is_some()
                || element.quantifier != Quantifier::One
                || element.item.pattern.is_group()
            {
                let message = "alternatives must be single node patterns".to_owned();
                return Err((start, QueryErrorKind::Structure(message)));
            }
            alternatives.push(element.item);
        }
        if alternatives.is_empty() {
            return Err((open, QueryErrorKind::Structure("empty alternation".to_owned())));
        }
        Ok(Pattern::Alternation(alternatives))
    }

    fn predicate(&mut self) -> Result<(), Failure> {
        let open = self.bump().offset;
        let token = self.bump();
        let TokenKind::PredicateName(name) = token.kind else {
            return Err((token.offset, QueryErrorKind::Syntax("expected a predicate".to_owned())));
        };
        let mut args = Vec::new();
        loop {
            let token = self.bump();
            let value = match token.kind {
                TokenKind::RightParen => break,
                TokenKind::Capture(name) => ArgValue::Capture(name),
                TokenKind::String(text) | TokenKind::Identifier(text) => ArgValue::Text(text),
                TokenKind::Eof => {
                    return Err((open, QueryErrorKind::Syntax("unclosed predicate".to_owned())));
                }
                kind => {
                    let message = format!("unexpected {} in predicate", kind.describe());
                    return Err((token.offset, QueryErrorKind::Syntax(message)));
                }
            };
            args.push(Arg { value, offset: token.offset });
        }
        self.predicates.push(RawPredicate { name, offset: token.offset, args });
        Ok(())
    }

    fn finish_predicates(&mut self) -> Result<Vec<Predicate>, Failure> {
        std::mem::take(&mut self.predicates)
            .into_iter()
            .map(|predicate| self.resolve(predicate))
            .collect()
    }

    fn capture(&self, name: &str, offset: TextSize) -> Result<u32, Failure> {
        self.pattern_captures
            .iter()
            .copied()
            .find(|&index| self.capture_names[index as usize] == name)
            .ok_or_else(|| (offset, QueryErrorKind::Capture(name.to_owned())))
    }

    fn resolve(&self, predicate: RawPredicate) -> Result<Predicate, Failure> {
        let RawPredicate { name, offset, args } = predicate;
        let invalid = |message: String| (offset, QueryErrorKind::Predicate(message));
        let (operator, negated) = match name.strip_prefix("not-") {
            Some(operator) => (operator, true),
            None => (name.as_str(), false),
        };
        if !matches!(operator, "eq?" | "match?" | "any-of?") {
            return Err(invalid(format!("unknown predicate `#{name}`")));
        }

        let mut args = args.into_iter();
        let capture = match args.next() {
            Some(Arg { value: ArgValue::Capture(capture), offset }) => {
                self.capture(&capture, offset)?
            }
            _ => return Err(invalid(format!("`#{name}` expects a capture first"))),
        };
        let rest: Vec<Arg> = args.collect();
        match (operator, rest.as_slice()) {
            ("eq?", [Arg { value, offset }]) => {
                let operand = match value {
                    ArgValue::Capture(other) => Operand::Capture(self.capture(other, *offset)?),
                    ArgValue::Text(text) => Operand::Text(text.clone()),
                };
                Ok(Predicate::Eq { capture, operand, negated })
            }
            ("match?", [Arg { value: ArgValue::Text(pattern), offset }]) => {
                let regex = Regex::new(pattern)
                    .map_err(|error| (*offset, QueryErrorKind::Predicate(error.to_string())))?;
                Ok(Predicate::Match { capture, regex, negated })
            }
            ("any-of?", [_, ..]) => {
                let values: Vec<String> = rest
                    .iter()
                    .map(|arg| match &arg.value {
                        ArgValue::Text(text) => Ok(text.clone()),
                        ArgValue::Capture(_) => Err(invalid(format!(
                            "`#{name}` expects strings after the capture"
                        ))),
                    })
                    .collect::<Result<_, _>>()?;
                Ok(Predicate::AnyOf { capture, values, negated })
            }
            _ => Err(invalid(format!("wrong arguments for `#{name}`"))),
        }
    }
}
