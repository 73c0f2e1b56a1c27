use std::cmp::Ordering;

use indexmap::IndexSet;
use rustc_hash::FxHashMap;
use triomphe::Arc;

use crate::language::LanguageInner;
use crate::raw::{
    RawAction, RawAssociativity, RawHeader, RawLanguage, RawPattern, RawState, RawSymbol,
    RawSymbolKind,
};
use crate::{
    ABI_VERSION, Associativity, FieldEntry, FieldId, GrammarLoadError, Language, LexMode, LexTable,
    ParseAction, Production, ProductionId, StateId, Symbol, SymbolInfo, SymbolKind,
};

impl Language {
    /// Loads and validates a serialized grammar table.
    pub fn from_json(bytes: &[u8]) -> Result<Self, GrammarLoadError> {
        let header: RawHeader = serde_json::from_slice(bytes)?;
        if header.abi_version != ABI_VERSION {
            return Err(GrammarLoadError::AbiVersion {
                found: header.abi_version,
                expected: ABI_VERSION,
            });
        }

        let raw: RawLanguage = serde_json::from_slice(bytes)?;
        Loader::new(&raw)?.load()
    }
}

struct Loader<'a> {
    raw: &'a RawLanguage,
    symbols: Vec<SymbolInfo>,
    resolved_conflicts: usize,
    ambiguous_entries: usize,
}

impl<'a> Loader<'a> {
    fn new(raw: &'a RawLanguage) -> Result<Self, GrammarLoadError> {
        // Ids are stored as `u16`, so every table must stay below that range.
        let limits: [(usize, fn(usize) -> GrammarLoadError); 6] = [
            (raw.symbols.len(), GrammarLoadError::TooManySymbols),
            (raw.states.len(), GrammarLoadError::TooManyStates),
            (raw.productions.len(), GrammarLoadError::TooManyProductions),
            (raw.lex_states.len(), GrammarLoadError::TooManyLexStates),
            (raw.external_lex_states.len(), GrammarLoadError::TooManyLexStates),
            (raw.fields.len(), GrammarLoadError::TooManyFields),
        ];
        if let Some(&(count, error)) =
            limits.iter().find(|(count, _)| *count >= usize::from(u16::MAX))
        {
            return Err(error(count));
        }
        match raw.symbols.first() {
            Some(end)
                if end.kind == RawSymbolKind::Terminal
                    && end.name == "end"
                    && end.pattern.is_none() => {}
            _ => return Err(GrammarLoadError::MissingEndSymbol),
        }

        let symbols = raw.symbols.iter().map(symbol_info).collect();
        Ok(Self { raw, symbols, resolved_conflicts: 0, ambiguous_entries: 0 })
    }

    fn load(mut self) -> Result<Language, GrammarLoadError> {
        let raw = self.raw;
        if raw.states.is_empty() {
            return Err(GrammarLoadError::NoStates);
        }

        for &extra in &raw.extras {
            let symbol = self.symbol(extra, "extras")?;
            let info = &mut self.symbols[symbol.index()];
            if !info.is_terminal() {
                return Err(GrammarLoadError::NonTerminalExtra(info.name.to_string()));
            }
            info.extra = true;
        }

        let fields: IndexSet<Box<str>> =
            raw.fields.iter().map(|name| name.as_str().into()).collect();
        let productions = self.productions(raw.fields.len())?;

        let symbol_count = self.symbols.len();
        let state_count = raw.states.len();
        let mut actions = vec![Box::<[ParseAction]>::default(); state_count * symbol_count];
        let mut gotos = vec![None; state_count * symbol_count];
        let mut lex_modes = Vec::with_capacity(state_count);

        for (index, state) in raw.states.iter().enumerate() {
            lex_modes.push(self.lex_mode(index, state)?);

            for entry in &state.actions {
                let symbol = self.symbol(entry.symbol, format!("state {index}"))?;
                if !self.symbols[symbol.index()].is_terminal() {
                    return Err(GrammarLoadError::ActionOnNonTerminal {
                        state: index as u32,
                        symbol: self.symbols[symbol.index()].name.to_string(),
                    });
                }
                let entry_actions = entry
                    .actions
                    .iter()
                    .map(|&action| self.action(index, action, &productions))
                    .collect::<Result<Vec<_>, _>>()?;
                let resolved = self.resolve(entry_actions, symbol, &productions);
                actions[index * symbol_count + symbol.index()] = resolved.into_boxed_slice();
            }

            for goto in &state.gotos {
                let symbol = self.symbol(goto.symbol, format!("state {index}"))?;
                if self.symbols[symbol.index()].is_terminal() {
                    return Err(GrammarLoadError::GotoOnTerminal {
                        state: index as u32,
                        symbol: self.symbols[symbol.index()].name.to_string(),
                    });
                }
                gotos[index * symbol_count + symbol.index()] =
                    Some(self.state(goto.state, format!("state {index}"))?);
            }
        }

        let lex_tables = self.lex_tables()?;
        let (external_symbols, external_lex_states) = self.external_lex_states()?;

        let mut recovery_boundaries = vec![false; symbol_count];
        for &boundary in &raw.recovery_boundaries {
            recovery_boundaries[self.symbol(boundary, "recovery_boundaries")?.index()] = true;
        }

        let mut named_ids: FxHashMap<Box<str>, Vec<Symbol>> = FxHashMap::default();
        let mut anonymous_ids: FxHashMap<Box<str>, Vec<Symbol>> = FxHashMap::default();
        for (id, info) in self.symbols.iter().enumerate().skip(1) {
            let ids = if info.named { &mut named_ids } else { &mut anonymous_ids };
            ids.entry(info.name.clone()).or_default().push(Symbol::new(id as u16));
        }

        log::debug!(
            "loaded grammar `{}`: {} symbols, {} states, {} productions, \
             {} conflicts resolved, {} ambiguous entries",
            raw.name,
            symbol_count,
            state_count,
            productions.len(),
            self.resolved_conflicts,
            self.ambiguous_entries,
        );

        Ok(Language(Arc::new(LanguageInner {
            name: raw.name.clone(),
            symbols: self.symbols.into_boxed_slice(),
            named_ids,
            anonymous_ids,
            fields,
            productions: productions.into_boxed_slice(),
            state_count,
            actions: actions.into_boxed_slice(),
            gotos: gotos.into_boxed_slice(),
            lex_modes: lex_modes.into_boxed_slice(),
            lex_tables,
            external_symbols,
            external_lex_states,
            recovery_boundaries: recovery_boundaries.into_boxed_slice(),
            external_scanner: raw.external_scanner.clone(),
        })))
    }

    fn symbol(&self, id: u32, context: impl Into<String>) -> Result<Symbol, GrammarLoadError> {
        if (id as usize) < self.symbols.len() {
            Ok(Symbol::new(id as u16))
        } else {
            Err(GrammarLoadError::reference(context, "symbol", id))
        }
    }

    fn state(&self, id: u32, context: impl Into<String>) -> Result<StateId, GrammarLoadError> {
        if (id as usize) < self.raw.states.len() {
            Ok(StateId::new(id as u16))
        } else {
            Err(GrammarLoadError::reference(context, "state", id))
        }
    }

    fn productions(&self, field_count: usize) -> Result<Vec<Production>, GrammarLoadError> {
        let mut productions = Vec::with_capacity(self.raw.productions.len());
        for (index, raw) in self.raw.productions.iter().enumerate() {
            let context = format!("production {index}");
            let lhs = self.symbol(raw.lhs, context.as_str())?;
            if self.symbols[lhs.index()].is_terminal() {
                return Err(GrammarLoadError::reference(context, "non-terminal", raw.lhs));
            }

            let mut fields = Vec::with_capacity(raw.fields.len());
            for entry in &raw.fields {
                let field = FieldId::new(entry.field as u16)
                    .filter(|_| (entry.field as usize) <= field_count)
                    .ok_or_else(|| {
                        GrammarLoadError::reference(context.as_str(), "field", entry.field)
                    })?;
                if entry.child_index >= raw.child_count {
                    return Err(GrammarLoadError::reference(
                        context.as_str(),
                        "child index",
                        u32::from(entry.child_index),
                    ));
                }
                fields.push(FieldEntry { field, child_index: entry.child_index });
            }

            productions.push(Production {
                lhs,
                child_count: raw.child_count,
                precedence: raw.precedence,
                associativity: raw.associativity.map(associativity),
                dynamic_precedence: raw.dynamic_precedence,
                fields: fields.into_boxed_slice(),
            });
        }
        Ok(productions)
    }

    fn lex_mode(&self, index: usize, state: &RawState) -> Result<LexMode, GrammarLoadError> {
        let context = format!("state {index}");
        if state.lex_state as usize >= self.raw.lex_states.len() {
            return Err(GrammarLoadError::reference(context, "lex state", state.lex_state));
        }
        // Index 0 is the implicit empty set; the table lists sets 1 and up.
        if state.external_lex_state as usize > self.raw.external_lex_states.len() {
            return Err(GrammarLoadError::reference(
                context,
                "external lex state",
                state.external_lex_state,
            ));
        }
        Ok(LexMode {
            lex_state: state.lex_state as u16,
            external_lex_state: state.external_lex_state as u16,
        })
    }

    fn action(
        &self,
        state: usize,
        action: RawAction,
        productions: &[Production],
    ) -> Result<ParseAction, GrammarLoadError> {
        let context = format!("state {state}");
        Ok(match action {
            RawAction::Shift(target) => ParseAction::Shift(self.state(target, context)?),
            RawAction::Reduce(production) => {
                if production as usize >= productions.len() {
                    return Err(GrammarLoadError::reference(context, "production", production));
                }
                ParseAction::Reduce(ProductionId::new(production as u16))
            }
            RawAction::Accept => ParseAction::Accept,
        })
    }

    /// Applies static precedence and associativity to a multi-action entry.
    ///
    /// Whatever survives stays a conflict and is explored by forking.
    fn resolve(
        &mut self,
        mut actions: Vec<ParseAction>,
        lookahead: Symbol,
        productions: &[Production],
    ) -> Vec<ParseAction> {
        let mut seen = Vec::with_capacity(actions.len());
        actions.retain(|action| {
            let fresh = !seen.contains(action);
            seen.push(*action);
            fresh
        });
        if actions.len() <= 1 {
            return actions;
        }

        let shift = actions.iter().find(|action| matches!(action, ParseAction::Shift(_))).copied();
        let accept = actions.contains(&ParseAction::Accept);
        let mut reduces: Vec<ProductionId> = actions
            .iter()
            .filter_map(|action| match action {
                ParseAction::Reduce(production) => Some(*production),
                _ => None,
            })
            .collect();

        if reduces.len() > 1
            && reduces.iter().all(|id| productions[id.index()].precedence.is_some())
        {
            let highest =
                reduces.iter().filter_map(|id| productions[id.index()].precedence).max();
            reduces.retain(|id| productions[id.index()].precedence == highest);
        }

        let token = &self.symbols[lookahead.index()];
        let mut keep_shift = shift.is_some();
        if let (Some(_), Some(token_precedence)) = (shift, token.precedence) {
            reduces.retain(|id| {
                let production = &productions[id.index()];
                let Some(rule_precedence) = production.precedence else {
                    return true;
                };
                match rule_precedence.cmp(&token_precedence) {
                    Ordering::Greater => {
                        keep_shift = false;
                        true
                    }
                    Ordering::Less => false,
                    Ordering::Equal => match production.associativity.or(token.associativity) {
                        Some(Associativity::Left) => {
                            keep_shift = false;
                            true
                        }
                        Some(Associativity::Right) => false,
                        Some(Associativity::None) | None => true,
                    },
                }
            });
        }

        let mut resolved = Vec::with_capacity(actions.len());
        resolved.extend(shift.filter(|_| keep_shift));
        resolved.extend(reduces.into_iter().map(ParseAction::Reduce));
        if accept {
            resolved.push(ParseAction::Accept);
        }

        if resolved.len() < actions.len() {
            self.resolved_conflicts += 1;
        }
        if resolved.len() > 1 {
            self.ambiguous_entries += 1;
        }
        resolved
    }

    fn lex_tables(&self) -> Result<Box<[LexTable]>, GrammarLoadError> {
        let mut tables = Vec::with_capacity(self.raw.lex_states.len() + 1);
        for (index, members) in self.raw.lex_states.iter().enumerate() {
            let mut symbols = members
                .iter()
                .map(|&id| self.symbol(id, format!("lex state {index}")))
                .collect::<Result<Vec<_>, _>>()?;
            symbols.sort_unstable();
            symbols.dedup();
            tables.push(self.lex_table(index as u32, symbols)?);
        }

        let all_terminals = (1..self.symbols.len())
            .filter(|&id| {
                let raw = &self.raw.symbols[id];
                raw.kind == RawSymbolKind::Terminal && raw.pattern.is_some()
            })
            .map(|id| Symbol::new(id as u16))
            .collect();
        tables.push(self.lex_table(self.raw.lex_states.len() as u32, all_terminals)?);
        Ok(tables.into_boxed_slice())
    }

    fn lex_table(&self, index: u32, symbols: Vec<Symbol>) -> Result<LexTable, GrammarLoadError> {
        let mut patterns = Vec::with_capacity(symbols.len());
        for symbol in &symbols {
            let raw = &self.raw.symbols[symbol.index()];
            let pattern = match (&raw.pattern, raw.kind) {
                (Some(RawPattern::String(text)), RawSymbolKind::Terminal) => regex::escape(text),
                (Some(RawPattern::Regex(regex)), RawSymbolKind::Terminal) => regex.clone(),
                _ => return Err(GrammarLoadError::MissingPattern(raw.name.clone())),
            };
            patterns.push(pattern);
        }
        LexTable::build(index, &patterns, symbols)
    }

    fn external_lex_states(
        &self,
    ) -> Result<(Box<[Symbol]>, Box<[Box<[bool]>]>), GrammarLoadError> {
        let external_symbols: Vec<Symbol> = self
            .symbols
            .iter()
            .enumerate()
            .filter(|(_, info)| info.kind == SymbolKind::External)
            .map(|(id, _)| Symbol::new(id as u16))
            .collect();

        let mut states = vec![vec![false; external_symbols.len()].into_boxed_slice()];
        for (index, members) in self.raw.external_lex_states.iter().enumerate() {
            let context = format!("external lex state {}", index + 1);
            let mut valid = vec![false; external_symbols.len()];
            for &id in members {
                let symbol = self.symbol(id, context.as_str())?;
                let position = external_symbols
                    .iter()
                    .position(|&external| external == symbol)
                    .ok_or_else(|| {
                        GrammarLoadError::reference(context.as_str(), "external symbol", id)
                    })?;
                valid[position] = true;
            }
            states.push(valid.into_boxed_slice());
        }

        Ok((external_symbols.into_boxed_slice(), states.into_boxed_slice()))
    }
}

fn symbol_info(raw: &RawSymbol) -> SymbolInfo {
    SymbolInfo {
        name: raw.name.as_str().into(),
        kind: match raw.kind {
            RawSymbolKind::Terminal => SymbolKind::Terminal,
            RawSymbolKind::NonTerminal => SymbolKind::NonTerminal,
            RawSymbolKind::External => SymbolKind::External,
        },
        named: raw.named,
        extra: false,
        precedence: raw.precedence,
        associativity: raw.associativity.map(associativity),
    }
}

fn associativity(raw: RawAssociativity) -> Associativity {
    match raw {
        RawAssociativity::Left => Associativity::Left,
        RawAssociativity::Right => Associativity::Right,
        RawAssociativity::None => Associativity::None,
    }
}
