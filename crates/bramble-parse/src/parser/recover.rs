//! Error recovery for a version that has no action for its lookahead.
//!
//! Strategies are tried cheapest first: insert one missing token, pop the
//! stack back to a state that accepts the lookahead, or skip the lookahead.
//! Every recovered version either consumes the lookahead on its next step
//! or has already consumed it, so parsing always moves forward.

use bramble_table::{Language, ParseAction, StateId, Symbol};
use bramble_tree::Subtree;

use super::{Lookahead, ParseRun, Status};
use crate::stack::NodeId;

/// Recoveries at one position before the lookahead is skipped outright.
const MAX_RECOVERY_ATTEMPTS: u32 = 8;

/// Bound on reductions while simulating a lookahead.
const MAX_SIMULATED_STEPS: usize = 1_000;

/// Runs the first action of each step for `symbol` on a stack of states,
/// without building trees. Returns the action that consumed the symbol.
fn simulate(language: &Language, states: &mut Vec<StateId>, symbol: Symbol) -> Option<ParseAction> {
    for _ in 0..MAX_SIMULATED_STEPS {
        let top = *states.last()?;
        match *language.actions(top, symbol).first()? {
            ParseAction::Reduce(production) => {
                let production = language.production(production);
                let count = usize::from(production.child_count);
                if count >= states.len() {
                    return None;
                }
                states.truncate(states.len() - count);
                let below = *states.last()?;
                states.push(language.goto(below, production.lhs)?);
            }
            ParseAction::Shift(next) => {
                states.push(next);
                return Some(ParseAction::Shift(next));
            }
            ParseAction::Accept => return Some(ParseAction::Accept),
        }
    }
    None
}

impl ParseRun<'_> {
    pub(super) fn recover(&mut self, index: usize) {
        let version = &mut self.versions[index];
        let lookahead = match std::mem::replace(&mut version.status, Status::Active) {
            Status::Failed(lookahead) => lookahead,
            status => {
                version.status = status;
                return;
            }
        };
        self.stats.recoveries += 1;

        let head = version.head;
        let position = self.stack[head].position.bytes;
        let recovery = &mut version.recovery;
        if recovery.position != position {
            recovery.position = position;
            recovery.attempts = 0;
        }
        recovery.attempts += 1;
        let exhausted = recovery.attempts > MAX_RECOVERY_ATTEMPTS;
        let may_insert = recovery.missing_at != Some(position);

        if !exhausted {
            if may_insert && let Some(head) = self.insert_missing(head, &lookahead) {
                let version = &mut self.versions[index];
                version.head = head;
                version.recovery.missing_at = Some(position);
                return;
            }
            if let Some(head) = self.pop_until_viable(head, &lookahead) {
                self.versions[index].head = head;
                return;
            }
        }
        self.skip(index, &lookahead);
    }

    /// Inserts the first terminal after which the lookahead can be consumed.
    fn insert_missing(&mut self, head: NodeId, lookahead: &Lookahead) -> Option<NodeId> {
        let language = self.language;
        let states = self.stack.states(head);
        let state = self.stack[head].state;
        let candidate = language.expected_terminals(state).find(|&symbol| {
            if symbol == Symbol::END || language.is_extra(symbol) {
                return false;
            }
            let mut simulated = states.clone();
            matches!(simulate(language, &mut simulated, symbol), Some(ParseAction::Shift(_)))
                && simulate(language, &mut simulated, lookahead.symbol()).is_some()
        })?;

        // The reductions run on a token that was never read, so a later
        // re-parse must build them again.
        let mut head = head;
        for _ in 0..MAX_SIMULATED_STEPS {
            let state = self.stack[head].state;
            match *language.actions(state, candidate).first()? {
                ParseAction::Reduce(production) => {
                    head = self.reduce(head, production, lookahead, true)?;
                }
                ParseAction::Shift(next) => {
                    log::debug!(
                        "recover: insert missing {} at {}",
                        language.symbol_name(candidate),
                        u32::from(self.stack[head].position.bytes)
                    );
                    let missing = Subtree::missing(candidate, state, language.lex_mode(state));
                    return Some(self.stack.push(head, missing, next));
                }
                ParseAction::Accept => return None,
            }
        }
        None
    }

    /// Pops the fewest subtrees that leave a state accepting the lookahead
    /// and pushes them back wrapped in an `ERROR` node.
    fn pop_until_viable(&mut self, head: NodeId, lookahead: &Lookahead) -> Option<NodeId> {
        let language = self.language;
        let mut states = self.stack.states(head);
        let mut base = head;
        loop {
            let node = &self.stack[base];
            let below = node.prev?;
            let popped_real = node.subtree.as_ref().is_some_and(|subtree| !subtree.is_extra());
            base = below;
            if !popped_real {
                continue;
            }
            states.pop();
            if states.is_empty() {
                return None;
            }
            if simulate(language, &mut states.clone(), lookahead.symbol()).is_some() {
                break;
            }
        }

        let children = self.stack.subtrees_above(base, head);
        log::debug!(
            "recover: wrap {} subtrees before {} in ERROR",
            children.len(),
            language.symbol_name(lookahead.symbol())
        );
        let state = self.stack[base].state;
        let error = Subtree::error(children, state).into_extra();
        Some(self.stack.push(base, error, state))
    }

    /// Consumes the lookahead into an `ERROR` node, joining the one the
    /// previous skip created unless that skip ended at a recovery boundary.
    /// At the end of input the whole stack becomes the root.
    fn skip(&mut self, index: usize, lookahead: &Lookahead) {
        let language = self.language;
        let head = self.versions[index].head;
        let node = &self.stack[head];
        let (state, position) = (node.state, node.position);

        let mut lookahead = lookahead.clone();
        if lookahead.token.size.is_empty() && lookahead.symbol() != Symbol::END {
            let external_state = node.external_state.clone();
            lookahead.token = self.lex(position, lookahead.state, &external_state, false);
        }
        if lookahead.symbol() == Symbol::END {
            log::debug!("recover: no recovery at end of input");
            let root = Subtree::error(self.stack.subtrees(head), StateId::START);
            self.versions[index].status = Status::Accepted(root);
            return;
        }

        log::debug!(
            "recover: skip {} at {}",
            language.symbol_name(lookahead.symbol()),
            u32::from(position.bytes)
        );
        let version = &self.versions[index];
        let (base, mut children) = match (version.recovery.skip_node, self.stack[head].prev) {
            (Some(skipping), Some(prev)) if skipping == head => {
                let previous = self.stack[head].subtree.as_ref();
                (prev, previous.map_or_else(Vec::new, |error| error.children().to_vec()))
            }
            _ => (head, Vec::new()),
        };
        children.push(lookahead.leaf());
        let error = Subtree::error(children, state).into_extra();
        let head = self.stack.push(base, error, state);

        let version = &mut self.versions[index];
        version.head = head;
        let boundary = language.is_recovery_boundary(lookahead.symbol());
        version.recovery.skip_node = (!boundary).then_some(head);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arithmetic() -> Language {
        let table =
            include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../grammars/arithmetic.json"));
        Language::from_json(table.as_bytes()).unwrap()
    }

    const NUMBER: Symbol = Symbol::new(1);
    const PLUS: Symbol = Symbol::new(2);

    #[test]
    fn simulation_follows_reductions() {
        let language = arithmetic();
        // `1 +` has been read: states 0, 1 (expr), 4 (`+`).
        let mut states = vec![StateId::START, StateId::new(1), StateId::new(4)];
        let shift = simulate(&language, &mut states, NUMBER);
        assert_eq!(shift, Some(ParseAction::Shift(StateId::new(2))));
        assert_eq!(simulate(&language, &mut states, Symbol::END), Some(ParseAction::Accept));
        assert_eq!(states, [StateId::START, StateId::new(1)]);

        let mut states = vec![StateId::START];
        assert_eq!(simulate(&language, &mut states, PLUS), None);
    }
}
