use std::fmt;

/// Counters collected during one parse.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Tokens produced by the lexer.
    pub tokens: usize,
    pub shifts: usize,
    pub reductions: usize,
    /// Stack versions created by conflicting actions.
    pub forks: usize,
    /// Versions dropped because another reached the same stack state.
    pub merges: usize,
    pub recoveries: usize,
    /// Subtrees taken over from the previous tree.
    pub reused: usize,
}

impl fmt::Display for ParseStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tokens, {} shifts, {} reductions, {} forks, {} merges, {} recoveries, {} reused",
            self.tokens,
            self.shifts,
            self.reductions,
            self.forks,
            self.merges,
            self.recoveries,
            self.reused
        )
    }
}
