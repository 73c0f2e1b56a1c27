mod recover;

use std::cmp::Ordering;

use bramble_lexer::{ExternalScanner, Lexer, ScannerFactory, TextSource, Token, builtin_scanner};
use bramble_table::{Language, LexMode, ParseAction, ProductionId, StateId, Symbol};
use bramble_tree::{ExternalState, InputEdit, Length, StaleTree, Subtree, Tree};
use text_size::TextSize;

use crate::stack::{NodeId, Stack};
use crate::{ParseStats, ParserConfig, ReusableNode};

/// Versions whose error cost exceeds the cheapest one by more than this are
/// dropped.
const MAX_COST_DIFFERENCE: u32 = 16 * bramble_tree::ERROR_COST_PER_SKIPPED_TREE;

/// Steps a version may take without moving before external tokens are
/// turned off for it.
const MAX_STALLED_STEPS: u32 = 64;

/// Incremental GLR parser for one [`Language`].
pub struct Parser {
    language: Language,
    scanner: Option<ScannerFactory>,
    config: ParserConfig,
    stats: ParseStats,
}

impl Parser {
    /// Creates a parser, attaching the built-in external scanner the
    /// language names, if any.
    pub fn new(language: Language) -> Self {
        let scanner = language.external_scanner().and_then(builtin_scanner).map(|(f, _)| f);
        Self { language, scanner, config: ParserConfig::default(), stats: ParseStats::default() }
    }

    #[must_use]
    pub fn with_scanner(mut self, scanner: ScannerFactory) -> Self {
        self.scanner = Some(scanner);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    pub fn set_config(&mut self, config: ParserConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    /// Counters of the latest parse.
    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }

    /// Parses `input`, reusing unchanged parts of `old_tree` when given.
    ///
    /// Always returns a tree covering the whole input; syntax errors show up
    /// as `ERROR` and missing nodes.
    pub fn parse<I: TextSource>(&mut self, mut input: I, old_tree: Option<&StaleTree>) -> Tree {
        let scanner = self.scanner.as_ref().map(|factory| factory());
        let reusable = old_tree
            .filter(|_| self.config.reuse_subtrees)
            .map(|old| ReusableNode::new(old.root().clone()));
        let run = ParseRun::new(&self.language, &self.config, &mut input, scanner, reusable);
        let (root, stats) = run.run();
        log::debug!("parsed {} bytes: {stats}", u32::from(root.size().bytes));
        self.stats = stats;
        Tree::new(root, self.language.clone())
    }

    /// Applies `edits` to `tree` in order and re-parses `input`.
    pub fn reparse<I: TextSource>(&mut self, input: I, tree: &Tree, edits: &[InputEdit]) -> Tree {
        let stale = edits
            .split_first()
            .map(|(first, rest)| rest.iter().fold(tree.edit(first), |stale, e| stale.edit(e)));
        self.parse(input, stale.as_ref())
    }
}

/// A token about to be consumed, with the state it was lexed in.
#[derive(Clone, Debug)]
struct Lookahead {
    token: Token,
    state: StateId,
    lex_mode: LexMode,
}

impl Lookahead {
    fn symbol(&self) -> Symbol {
        self.token.symbol
    }

    fn leaf(&self) -> Subtree {
        let token = &self.token;
        let leaf = Subtree::leaf(
            token.symbol,
            token.size,
            token.lookahead_bytes,
            self.state,
            self.lex_mode,
        );
        match &token.external_state {
            Some(state) => leaf.with_external_state(state.clone()),
            None => leaf,
        }
    }
}

#[derive(Clone, Debug)]
enum Status {
    Active,
    /// No action for the lookahead; waiting for recovery.
    Failed(Lookahead),
    Accepted(Subtree),
}

#[derive(Clone, Copy, Debug, Default)]
struct RecoveryState {
    /// Position of the latest recovery and how often it recovered there.
    position: TextSize,
    attempts: u32,
    /// Position where a missing token was last inserted.
    missing_at: Option<TextSize>,
    /// `ERROR` node on top of the stack that further skipped tokens join.
    skip_node: Option<NodeId>,
}

#[derive(Clone, Debug)]
struct Version {
    head: NodeId,
    status: Status,
    recovery: RecoveryState,
    stalled: u32,
}

impl Version {
    fn is_active(&self) -> bool {
        matches!(self.status, Status::Active)
    }
}

struct CachedToken {
    position: Length,
    lex_mode: LexMode,
    external_state: ExternalState,
    allow_external: bool,
    token: Token,
}

/// State of a single call to [`Parser::parse`].
struct ParseRun<'a> {
    language: &'a Language,
    config: &'a ParserConfig,
    lexer: Lexer<'a>,
    stack: Stack,
    versions: Vec<Version>,
    reusable: Option<ReusableNode>,
    cached_token: Option<CachedToken>,
    stats: ParseStats,
}

impl<'a> ParseRun<'a> {
    fn new(
        language: &'a Language,
        config: &'a ParserConfig,
        input: &'a mut dyn TextSource,
        scanner: Option<Box<dyn ExternalScanner>>,
        reusable: Option<ReusableNode>,
    ) -> Self {
        Self {
            language,
            config,
            lexer: Lexer::new(language, input, scanner),
            stack: Stack::default(),
            versions: Vec::new(),
            reusable,
            cached_token: None,
            stats: ParseStats::default(),
        }
    }

    fn run(mut self) -> (Subtree, ParseStats) {
        let base = self.stack.base();
        self.versions.push(Version {
            head: base,
            status: Status::Active,
            recovery: RecoveryState::default(),
            stalled: 0,
        });

        while let Some(index) = self.next_version() {
            let position = self.stack[self.versions[index].head].position;
            self.advance(index);
            self.track_progress(index, position);
            self.condense();
        }
        let root = self.finish();
        (root, self.stats)
    }

    /// The active version furthest behind.
    fn next_version(&self) -> Option<usize> {
        self.versions
            .iter()
            .enumerate()
            .filter(|(_, version)| version.is_active())
            .min_by_key(|(_, version)| self.stack[version.head].position.bytes)
            .map(|(index, _)| index)
    }

    fn track_progress(&mut self, index: usize, before: Length) {
        let Some(version) = self.versions.get_mut(index) else {
            return;
        };
        if self.stack[version.head].position.bytes > before.bytes {
            version.stalled = 0;
        } else {
            version.stalled += 1;
        }
    }

    /// Moves one version past one token or reused subtree.
    fn advance(&mut self, index: usize) {
        let version = &self.versions[index];
        let head = version.head;
        let allow_external = version.stalled < MAX_STALLED_STEPS;
        let node = &self.stack[head];
        let (state, position) = (node.state, node.position);
        let external_state = node.external_state.clone();
        log::trace!("version {index}: state {state:?} at {}", u32::from(position.bytes));

        let reused = self.reusable_subtree(state, position, &external_state);
        let token = match reused {
            Some(subtree) if !subtree.is_leaf() => {
                if let Some(next) = self.language.goto(state, subtree.symbol()) {
                    log::debug!(
                        "reuse {} at {}..{}",
                        self.language.symbol_name(subtree.symbol()),
                        u32::from(position.bytes),
                        u32::from((position + subtree.size()).bytes)
                    );
                    self.stats.reused += 1;
                    self.versions[index].head = self.stack.push(head, subtree, next);
                    return;
                }
                self.lex(position, state, &external_state, allow_external)
            }
            Some(leaf) => {
                self.stats.reused += 1;
                Token {
                    symbol: leaf.symbol(),
                    size: leaf.size(),
                    lookahead_bytes: leaf.lookahead_bytes(),
                    external_state: leaf
                        .has_external_tokens()
                        .then(|| leaf.external_state().clone()),
                }
            }
            None => self.lex(position, state, &external_state, allow_external),
        };

        let lookahead = Lookahead { token, state, lex_mode: self.language.lex_mode(state) };
        self.consume(index, &lookahead);
    }

    fn reusable_subtree(
        &mut self,
        state: StateId,
        position: Length,
        external_state: &ExternalState,
    ) -> Option<Subtree> {
        if self.versions.len() != 1 {
            return None;
        }
        let reusable = self.reusable.as_mut()?;
        reusable.find(self.language, position.bytes, state, external_state)
    }

    fn lex(
        &mut self,
        position: Length,
        state: StateId,
        external_state: &ExternalState,
        allow_external: bool,
    ) -> Token {
        let lex_mode = self.language.lex_mode(state);
        if let Some(cached) = &self.cached_token
            && cached.position == position
            && cached.lex_mode == lex_mode
            && cached.allow_external == allow_external
            && cached.external_state == *external_state
        {
            return cached.token.clone();
        }

        let token = self.lexer.lex(position, lex_mode, external_state, allow_external);
        self.stats.tokens += 1;
        log::trace!(
            "lex {} at {} ({} bytes)",
            self.language.symbol_name(token.symbol),
            u32::from(position.bytes),
            u32::from(token.size.bytes)
        );
        self.cached_token = Some(CachedToken {
            position,
            lex_mode,
            external_state: external_state.clone(),
            allow_external,
            token: token.clone(),
        });
        token
    }

    /// Performs every action the table lists for `lookahead`, forking the
    /// version when there is more than one.
    fn consume(&mut self, index: usize, lookahead: &Lookahead) {
        let language = self.language;
        let symbol = lookahead.symbol();
        let mut fragile = self.versions.len() > 1;
        let mut heads = vec![self.versions[index].head];
        let mut shifted = Vec::new();
        let mut accepted = Vec::new();
        let mut reductions = 0;
        let mut next = 0;

        'heads: while let Some(&head) = heads.get(next) {
            next += 1;
            let state = self.stack[head].state;
            let actions = language.actions(state, symbol);
            if actions.is_empty() {
                if language.is_extra(symbol) {
                    shifted.push(self.shift(head, lookahead, state, true, fragile));
                }
                continue;
            }
            fragile |= actions.len() > 1;
            for &action in actions {
                match action {
                    ParseAction::Shift(next_state) => {
                        shifted.push(self.shift(head, lookahead, next_state, false, fragile));
                    }
                    ParseAction::Reduce(production) => {
                        reductions += 1;
                        if reductions > self.config.max_reductions_per_token {
                            log::debug!("version {index}: reduction budget exhausted");
                            break 'heads;
                        }
                        if let Some(reduced) = self.reduce(head, production, lookahead, fragile) {
                            heads.push(reduced);
                        }
                    }
                    ParseAction::Accept => accepted.push(head),
                }
            }
        }

        if shifted.is_empty() && accepted.is_empty() {
            log::debug!(
                "version {index}: no action for {} in state {:?}",
                language.symbol_name(symbol),
                self.stack[self.versions[index].head].state
            );
            self.versions[index].status = Status::Failed(lookahead.clone());
            return;
        }

        let template = self.versions[index].clone();
        let accepted: Vec<_> = accepted
            .into_iter()
            .map(|head| Version { head, status: Status::Accepted(self.finalize(head)), ..template })
            .collect();
        let mut results = shifted
            .into_iter()
            .map(|head| Version { head, status: template.status.clone(), ..template })
            .chain(accepted);
        if let Some(first) = results.next() {
            self.versions[index] = first;
        }
        let before = self.versions.len();
        self.versions.extend(results);
        let forks = self.versions.len() - before;
        if forks > 0 {
            log::debug!("version {index}: {forks} forks on {}", language.symbol_name(symbol));
            self.stats.forks += forks;
        }
    }

    fn shift(
        &mut self,
        head: NodeId,
        lookahead: &Lookahead,
        state: StateId,
        extra: bool,
        fragile: bool,
    ) -> NodeId {
        let leaf = lookahead.leaf();
        let leaf = if extra { leaf.into_extra() } else { leaf };
        // Where versions split, the surviving one may depend on the stack
        // below this token, so nodes around it are not reused.
        let leaf = if fragile { leaf.into_fragile() } else { leaf };
        self.stats.shifts += 1;
        log::trace!("shift {} -> {state:?}", self.language.symbol_name(leaf.symbol()));
        self.stack.push(head, leaf, state)
    }

    /// Reduces by `production` on top of `head`, returning the new head.
    fn reduce(
        &mut self,
        head: NodeId,
        production_id: ProductionId,
        lookahead: &Lookahead,
        fragile: bool,
    ) -> Option<NodeId> {
        let language = self.language;
        let production = language.production(production_id);
        let popped = self.stack.pop(head, usize::from(production.child_count))?;
        let base = &self.stack[popped.base];
        let Some(state) = language.goto(base.state, production.lhs) else {
            log::debug!(
                "no goto for {} in state {:?}",
                language.symbol_name(production.lhs),
                base.state
            );
            return None;
        };

        let node = Subtree::node(
            production.lhs,
            popped.children,
            production_id,
            production.dynamic_precedence,
            base.state,
        );
        // The node depends on every byte the lookahead token examined.
        let node_end = (base.position + node.size()).bytes;
        let token = &lookahead.token;
        let lookahead_end = self.stack[head].position.bytes
            + token.size.bytes
            + TextSize::new(token.lookahead_bytes);
        let node = node.with_min_lookahead(u32::from(lookahead_end - node_end));
        let node = if fragile { node.into_fragile() } else { node };

        self.stats.reductions += 1;
        log::trace!("reduce {} -> {state:?}", language.symbol_name(production.lhs));
        let mut head = self.stack.push(popped.base, node, state);
        for extra in popped.trailing_extras {
            head = self.stack.push(head, extra, state);
        }
        Some(head)
    }

    /// Builds the root of an accepted version, folding surrounding extras
    /// into it.
    fn finalize(&self, head: NodeId) -> Subtree {
        let subtrees = self.stack.subtrees(head);
        let mut roots = (0..subtrees.len()).filter(|&index| !subtrees[index].is_extra());
        let index = match (roots.next(), roots.next()) {
            (Some(index), None) if !subtrees[index].is_leaf() => index,
            _ => return Subtree::error(subtrees, StateId::START),
        };
        let root = &subtrees[index];
        if subtrees.len() == 1 {
            return root.clone();
        }
        let mut children = subtrees[..index].to_vec();
        children.extend_from_slice(root.children());
        children.extend_from_slice(&subtrees[index + 1..]);
        root.with_children(children)
    }

    /// Cost and precedence a version is ranked by.
    fn score(&self, version: &Version) -> (u32, i32) {
        match &version.status {
            Status::Accepted(root) => (root.error_cost(), root.dynamic_precedence()),
            _ => {
                let head = &self.stack[version.head];
                (head.error_cost, head.dynamic_precedence)
            }
        }
    }

    /// Orders versions best first: lower cost, then higher dynamic
    /// precedence, then the order of their subtrees.
    fn compare_versions(&self, left: &Version, right: &Version) -> Ordering {
        let (left_cost, left_precedence) = self.score(left);
        let (right_cost, right_precedence) = self.score(right);
        left_cost
            .cmp(&right_cost)
            .then(right_precedence.cmp(&left_precedence))
            .then_with(|| match (&left.status, &right.status) {
                (Status::Accepted(left), Status::Accepted(right)) => left.compare(right),
                _ => self.stack.compare(left.head, right.head),
            })
    }

    /// Drops failed, duplicate and hopeless versions. When every version
    /// failed, the best one recovers.
    fn condense(&mut self) {
        if self.versions.iter().all(|version| matches!(version.status, Status::Failed(_))) {
            let best = (0..self.versions.len())
                .min_by(|&l, &r| self.compare_versions(&self.versions[l], &self.versions[r]));
            if let Some(best) = best {
                self.versions.swap(0, best);
                self.versions.truncate(1);
                self.recover(0);
            }
        } else {
            self.versions.retain(|version| !matches!(version.status, Status::Failed(_)));
        }

        self.merge_versions();
        self.keep_best_accepted();

        self.drop_costly_versions();

        if self.versions.len() > self.config.max_versions {
            let mut versions = std::mem::take(&mut self.versions);
            versions.sort_by(|left, right| self.compare_versions(left, right));
            versions.truncate(self.config.max_versions);
            self.versions = versions;
        }
    }

    /// Merges active versions at the same position whose stacks went
    /// through the same states, keeping the better one.
    fn merge_versions(&mut self) {
        let mut i = 0;
        while i < self.versions.len() {
            let mut j = i + 1;
            while j < self.versions.len() {
                let (left, right) = (&self.versions[i], &self.versions[j]);
                let (l, r) = (&self.stack[left.head], &self.stack[right.head]);
                let mergeable = left.is_active()
                    && right.is_active()
                    && l.position == r.position
                    && l.external_state == r.external_state
                    && self.stack.same_states(left.head, right.head);
                if mergeable {
                    if self.compare_versions(right, left).is_lt() {
                        self.versions.swap(i, j);
                    }
                    self.versions.remove(j);
                    self.stats.merges += 1;
                    log::debug!("merged version {j} into {i}");
                } else {
                    j += 1;
                }
            }
            i += 1;
        }
    }

    /// Drops active versions that can no longer beat an accepted one or
    /// trail the cheapest version by too much. Costs never decrease.
    fn drop_costly_versions(&mut self) {
        let costs: Vec<_> = self.versions.iter().map(|version| self.score(version).0).collect();
        let Some(cheapest) = costs.iter().copied().min() else {
            return;
        };
        let accepted = self
            .versions
            .iter()
            .zip(&costs)
            .filter(|(version, _)| matches!(version.status, Status::Accepted(_)))
            .map(|(_, &cost)| cost)
            .min();
        let limit = cheapest.saturating_add(MAX_COST_DIFFERENCE).min(accepted.unwrap_or(u32::MAX));

        let before = self.versions.len();
        let mut costs = costs.into_iter();
        self.versions.retain(|version| {
            let cost = costs.next().unwrap_or_default();
            !version.is_active() || cost <= limit
        });
        if self.versions.len() < before {
            log::debug!("dropped {} costly versions", before - self.versions.len());
        }
    }

    fn keep_best_accepted(&mut self) {
        let best = self
            .versions
            .iter()
            .enumerate()
            .filter(|(_, version)| matches!(version.status, Status::Accepted(_)))
            .min_by(|(_, left), (_, right)| self.compare_versions(left, right))
            .map(|(index, _)| index);
        if let Some(best) = best {
            let mut index = 0;
            self.versions.retain(|version| {
                let keep = index == best || !matches!(version.status, Status::Accepted(_));
                index += 1;
                keep
            });
        }
    }

    fn finish(&self) -> Subtree {
        let accepted = self
            .versions
            .iter()
            .filter(|version| matches!(version.status, Status::Accepted(_)))
            .min_by(|left, right| self.compare_versions(left, right));
        if let Some(Version { status: Status::Accepted(root), .. }) = accepted {
            return root.clone();
        }
        log::warn!("no version accepted the input");
        let children = self
            .versions
            .first()
            .map_or_else(Vec::new, |version| self.stack.subtrees(version.head));
        Subtree::error(children, StateId::START)
    }
}
