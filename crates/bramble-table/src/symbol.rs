use std::fmt;

/// Grammar symbol identifier.
///
/// Ids index the table's symbol list, except for [`Symbol::ERROR`], which is
/// implicit in every language.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(u16);

impl Symbol {
    /// End of input.
    pub const END: Self = Self(0);
    /// Region the grammar could not match.
    pub const ERROR: Self = Self(u16::MAX);

    #[inline]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn id(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ERROR => f.write_str("Symbol(ERROR)"),
            Self(id) => write!(f, "Symbol({id})"),
        }
    }
}

/// Parse state identifier; state 0 is the start state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StateId(u16);

impl StateId {
    pub const START: Self = Self(0);

    #[inline]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ProductionId(u16);

impl ProductionId {
    #[inline]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Field identifier, starting at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId(u16);

impl FieldId {
    #[inline]
    pub const fn new(id: u16) -> Option<Self> {
        if id == 0 { None } else { Some(Self(id)) }
    }

    #[inline]
    pub const fn get(self) -> u16 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Terminal,
    NonTerminal,
    /// Terminal produced by an external scanner.
    External,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Associativity {
    Left,
    Right,
    None,
}

#[derive(Clone, Debug)]
pub struct SymbolInfo {
    pub name: Box<str>,
    pub kind: SymbolKind,
    pub named: bool,
    pub extra: bool,
    pub precedence: Option<i32>,
    pub associativity: Option<Associativity>,
}

impl SymbolInfo {
    pub fn is_terminal(&self) -> bool {
        self.kind != SymbolKind::NonTerminal
    }
}
