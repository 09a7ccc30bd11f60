/// Tunables for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Reject links and sources whose nodes are not staged. When off they
    /// are dropped from the pass with a warning.
    pub strict_references: bool,
    /// Persist an audit row for each successful reconcile pass.
    pub record_passes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strict_references: true,
            record_passes: true,
        }
    }
}
