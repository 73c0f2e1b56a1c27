use std::fmt;

use indexmap::IndexSet;
use rustc_hash::FxHashMap;
use triomphe::Arc;

use crate::{
    FieldId, LexMode, LexTable, ParseAction, Production, ProductionId, StateId, Symbol, SymbolInfo,
    SymbolKind,
};

/// A loaded grammar: parse tables, lexical automata and symbol metadata.
///
/// Cloning is cheap; all clones share the same immutable tables.
#[derive(Clone)]
pub struct Language(pub(crate) Arc<LanguageInner>);

pub(crate) struct LanguageInner {
    pub(crate) name: String,
    pub(crate) symbols: Box<[SymbolInfo]>,
    pub(crate) named_ids: FxHashMap<Box<str>, Vec<Symbol>>,
    pub(crate) anonymous_ids: FxHashMap<Box<str>, Vec<Symbol>>,
    pub(crate) fields: IndexSet<Box<str>>,
    pub(crate) productions: Box<[Production]>,
    pub(crate) state_count: usize,
    /// Dense `state * symbol_count + symbol` matrix.
    pub(crate) actions: Box<[Box<[ParseAction]>]>,
    /// Dense `state * symbol_count + symbol` matrix.
    pub(crate) gotos: Box<[Option<StateId>]>,
    pub(crate) lex_modes: Box<[LexMode]>,
    /// The last table recognizes every terminal and is used when a state's
    /// own table matches nothing.
    pub(crate) lex_tables: Box<[LexTable]>,
    pub(crate) external_symbols: Box<[Symbol]>,
    pub(crate) external_lex_states: Box<[Box<[bool]>]>,
    pub(crate) recovery_boundaries: Box<[bool]>,
    pub(crate) external_scanner: Option<String>,
}

impl Language {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn symbol_count(&self) -> usize {
        self.0.symbols.len()
    }

    pub fn state_count(&self) -> usize {
        self.0.state_count
    }

    pub fn field_count(&self) -> usize {
        self.0.fields.len()
    }

    pub fn symbol_info(&self, symbol: Symbol) -> Option<&SymbolInfo> {
        self.0.symbols.get(symbol.index())
    }

    pub fn symbol_name(&self, symbol: Symbol) -> &str {
        self.symbol_info(symbol).map_or("ERROR", |info| &info.name)
    }

    pub fn is_named(&self, symbol: Symbol) -> bool {
        self.symbol_info(symbol).is_none_or(|info| info.named)
    }

    pub fn is_terminal(&self, symbol: Symbol) -> bool {
        self.symbol_info(symbol).is_some_and(SymbolInfo::is_terminal)
    }

    pub fn is_external(&self, symbol: Symbol) -> bool {
        self.symbol_info(symbol).is_some_and(|info| info.kind == SymbolKind::External)
    }

    pub fn is_extra(&self, symbol: Symbol) -> bool {
        self.symbol_info(symbol).is_some_and(|info| info.extra)
    }

    pub fn is_recovery_boundary(&self, symbol: Symbol) -> bool {
        self.0.recovery_boundaries.get(symbol.index()).copied().unwrap_or(false)
    }

    /// Returns every symbol with the given name, named or anonymous.
    pub fn symbols_for_name(&self, name: &str, named: bool) -> &[Symbol] {
        let ids = if named { &self.0.named_ids } else { &self.0.anonymous_ids };
        ids.get(name).map_or(&[][..], Vec::as_slice)
    }

    pub fn field_name(&self, field: FieldId) -> Option<&str> {
        self.0.fields.get_index(usize::from(field.get()) - 1).map(|name| &**name)
    }

    pub fn field_id_for_name(&self, name: &str) -> Option<FieldId> {
        let index = self.0.fields.get_index_of(name)?;
        FieldId::new(index as u16 + 1)
    }

    /// Returns the actions for `symbol` in `state`, empty on a syntax error.
    #[inline]
    pub fn actions(&self, state: StateId, symbol: Symbol) -> &[ParseAction] {
        if symbol.index() >= self.symbol_count() || state.index() >= self.0.state_count {
            return &[];
        }
        &self.0.actions[state.index() * self.symbol_count() + symbol.index()]
    }

    #[inline]
    pub fn goto(&self, state: StateId, symbol: Symbol) -> Option<StateId> {
        if symbol.index() >= self.symbol_count() || state.index() >= self.0.state_count {
            return None;
        }
        self.0.gotos[state.index() * self.symbol_count() + symbol.index()]
    }

    /// Returns the terminals that have at least one action in `state`.
    pub fn expected_terminals(&self, state: StateId) -> impl Iterator<Item = Symbol> + '_ {
        (0..self.symbol_count() as u16)
            .map(Symbol::new)
            .filter(move |&symbol| {
                self.is_terminal(symbol) && !self.actions(state, symbol).is_empty()
            })
    }

    #[inline]
    pub fn lex_mode(&self, state: StateId) -> LexMode {
        self.0.lex_modes.get(state.index()).copied().unwrap_or_default()
    }

    pub fn lex_table(&self, lex_state: u16) -> &LexTable {
        let tables = &self.0.lex_tables;
        tables.get(usize::from(lex_state)).unwrap_or(&tables[tables.len() - 1])
    }

    /// Lex state that recognizes every terminal with a pattern.
    pub fn error_lex_state(&self) -> u16 {
        (self.0.lex_tables.len() - 1) as u16
    }

    pub fn production(&self, production: ProductionId) -> &Production {
        &self.0.productions[production.index()]
    }

    pub fn production_count(&self) -> usize {
        self.0.productions.len()
    }

    /// External symbols in scanner order: the scanner reports token `i` as
    /// `external_symbols()[i]`.
    pub fn external_symbols(&self) -> &[Symbol] {
        &self.0.external_symbols
    }

    /// Returns which external tokens are valid in the given external lex state.
    pub fn external_valid_tokens(&self, external_lex_state: u16) -> &[bool] {
        let states = &self.0.external_lex_states;
        states.get(usize::from(external_lex_state)).map_or(&[][..], |valid| &**valid)
    }

    /// Name of the built-in external scanner the table asks for.
    pub fn external_scanner(&self) -> Option<&str> {
        self.0.external_scanner.as_deref()
    }
}

impl PartialEq for Language {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Language {}

impl fmt::Debug for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Language")
            .field("name", &self.0.name)
            .field("symbols", &self.symbol_count())
            .field("states", &self.state_count())
            .finish_non_exhaustive()
    }
}
