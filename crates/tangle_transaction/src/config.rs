//! Configuration for transaction hierarchies.

/// Tunables applied to every transaction of a hierarchy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionConfig {
    /// Maximum number of sub-transactions stacked below the root.
    pub max_nesting_depth: usize,

    /// Verify relation symmetry before every commit.
    pub check_consistency_on_commit: bool,

    /// On root commit, mark the owner of a changed one-to-one virtual end
    /// point as changed so the store checks its timestamp.
    pub mark_one_to_one_virtual_changes: bool,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: 8,
            check_consistency_on_commit: false,
            mark_one_to_one_virtual_changes: true,
        }
    }
}

impl TransactionConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that checks consistency on every commit.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            check_consistency_on_commit: true,
            ..Self::default()
        }
    }

    /// Builder method to set the maximum nesting depth.
    #[must_use]
    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    /// Builder method to enable/disable the commit-time consistency check.
    #[must_use]
    pub fn with_consistency_check(mut self, check: bool) -> Self {
        self.check_consistency_on_commit = check;
        self
    }

    /// Builder method to enable/disable marking one-to-one virtual owners.
    #[must_use]
    pub fn with_one_to_one_marking(mut self, mark: bool) -> Self {
        self.mark_one_to_one_virtual_changes = mark;
        self
    }
}
