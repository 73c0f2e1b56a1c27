use regex_automata::dfa::dense::BuildError;

/// A grammar table that cannot be used.
///
/// Loading never returns a partially initialized language.
#[derive(Debug, thiserror::Error)]
pub enum GrammarLoadError {
    #[error("malformed grammar table: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported table ABI version {found}, expected {expected}")]
    AbiVersion { found: u32, expected: u32 },

    #[error("grammar table has no parse states")]
    NoStates,

    #[error("grammar table declares {0} symbols, more than the supported maximum")]
    TooManySymbols(usize),

    #[error("grammar table declares {0} parse states, more than the supported maximum")]
    TooManyStates(usize),

    #[error("grammar table declares {0} productions, more than the supported maximum")]
    TooManyProductions(usize),

    #[error("grammar table declares {0} lex states, more than the supported maximum")]
    TooManyLexStates(usize),

    #[error("grammar table declares {0} fields, more than the supported maximum")]
    TooManyFields(usize),

    #[error("symbol 0 must be the `end` terminal")]
    MissingEndSymbol,

    #[error("{context}: unknown {what} {index}")]
    InvalidReference { context: String, what: &'static str, index: u32 },

    #[error("state {state}: action keyed by non-terminal `{symbol}`")]
    ActionOnNonTerminal { state: u32, symbol: String },

    #[error("state {state}: goto keyed by terminal `{symbol}`")]
    GotoOnTerminal { state: u32, symbol: String },

    #[error("extra symbol `{0}` must be a terminal")]
    NonTerminalExtra(String),

    #[error("terminal `{0}` appears in a lex state but has no pattern")]
    MissingPattern(String),

    #[error("invalid pattern in lex state {lex_state}")]
    InvalidPattern {
        lex_state: u32,
        #[source]
        source: Box<BuildError>,
    },

    #[error("lex state {lex_state}: {message}")]
    Automaton { lex_state: u32, message: String },

    #[error("lex state {0} contains a pattern that matches the empty string")]
    EmptyMatch(u32),

    #[error("unknown external scanner `{0}`")]
    UnknownScanner(String),

    #[error("grammar declares external tokens but no external scanner")]
    MissingScanner,

    #[error("external scanner `{scanner}` produces {expected} tokens, grammar declares {found}")]
    ScannerMismatch { scanner: String, expected: usize, found: usize },
}

impl GrammarLoadError {
    pub(crate) fn reference(context: impl Into<String>, what: &'static str, index: u32) -> Self {
        Self::InvalidReference { context: context.into(), what, index }
    }
}
