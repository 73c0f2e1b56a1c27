/// Limits and switches for a [`Parser`](crate::Parser).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParserConfig {
    /// Upper bound on simultaneously alive stack versions.
    pub max_versions: usize,
    /// Reductions one version may perform before shifting a token.
    pub max_reductions_per_token: usize,
    /// Reuse unchanged subtrees of the previous tree during a re-parse.
    pub reuse_subtrees: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { max_versions: 6, max_reductions_per_token: 10_000, reuse_subtrees: true }
    }
}

impl ParserConfig {
    /// Sets the version cap; at least one version is always kept.
    #[must_use]
    pub fn max_versions(mut self, max_versions: usize) -> Self {
        self.max_versions = max_versions.max(1);
        self
    }

    #[must_use]
    pub fn max_reductions_per_token(mut self, max_reductions: usize) -> Self {
        self.max_reductions_per_token = max_reductions.max(1);
        self
    }

    #[must_use]
    pub fn reuse_subtrees(mut self, reuse: bool) -> Self {
        self.reuse_subtrees = reuse;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_clamps_limits() {
        let config = ParserConfig::default().max_versions(0).reuse_subtrees(false);
        assert_eq!(config.max_versions, 1);
        assert!(!config.reuse_subtrees);
        assert_eq!(config.max_reductions_per_token, 10_000);
    }
}
