pub mod config;
pub mod error;
pub mod reconcile;
pub mod replay;
pub mod staging;
pub mod version;

pub use config::EngineConfig;
pub use error::EngineError;
pub use reconcile::{ChangeCounts, DiffReconciler, ReconcilePhase, ReconcileReport};
pub use replay::{HistoryReplay, ProvisionalBirths};
pub use staging::StagingBuffer;
pub use version::VersionTracker;

use std::collections::BTreeSet;

use tracing::{info, instrument};

use tracegraph_core::{
    CODE_LABEL, CONTAINED_BY, IMPLEMENTS, LiveState, PACKAGE_LABEL, Version, VersionState,
};
use tracegraph_storage::{GraphStore, PassRecord, SqliteGraphStore};

/// Public entry point: staging, reconciliation, tagging and history queries
/// over one graph store.
///
/// Not safe to drive from two callers at once. Callers serialize `reconcile`
/// and `tag` themselves.
pub struct Engine<S: GraphStore = SqliteGraphStore> {
    store: S,
    staging: StagingBuffer,
    config: EngineConfig,
    phase: ReconcilePhase,
}

impl Engine<SqliteGraphStore> {
    pub fn open(path: &str) -> Result<Self, EngineError> {
        Ok(Self::new(SqliteGraphStore::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, EngineError> {
        Ok(Self::new(SqliteGraphStore::open_in_memory()?))
    }
}

impl<S: GraphStore> Engine<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            staging: StagingBuffer::new(),
            config,
            phase: ReconcilePhase::Idle,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn staging(&self) -> &StagingBuffer {
        &self.staging
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Phase the last reconcile ended in: `Idle` after success, `Failed` otherwise.
    pub fn phase(&self) -> ReconcilePhase {
        self.phase
    }

    // ========================================================================
    // Staging
    // ========================================================================

    pub fn stage_node(
        &mut self,
        id: &str,
        node_type: &str,
        data: &[u8],
    ) -> Result<(), EngineError> {
        Ok(self.staging.stage_node(id, node_type, data)?)
    }

    pub fn stage_link(
        &mut self,
        source: &str,
        kind: &str,
        target: &str,
    ) -> Result<(), EngineError> {
        Ok(self.staging.stage_link(source, kind, target)?)
    }

    pub fn stage_source(
        &mut self,
        package: &str,
        file: &str,
        commit: &str,
        issue: &str,
    ) -> Result<(), EngineError> {
        Ok(self.staging.stage_source(package, file, commit, issue)?)
    }

    // ========================================================================
    // Versioning
    // ========================================================================

    /// Run one full pass against the staged state. The buffer is cleared only
    /// when the pass succeeds.
    #[instrument(
        skip(self),
        fields(
            nodes = self.staging.nodes().len(),
            links = self.staging.links().len(),
            sources = self.staging.sources().len(),
        )
    )]
    pub fn reconcile(&mut self) -> Result<ReconcileReport, EngineError> {
        let mut reconciler = DiffReconciler::new(&mut self.store, &self.config);
        let result = reconciler.run(&self.staging);
        self.phase = reconciler.phase();
        let report = result?;

        self.staging.clear();
        let counts = report.counts();
        info!(
            pass = %report.pass_id,
            version = report.version,
            added = counts.added,
            removed = counts.removed,
            modified = counts.modified,
            "reconcile complete"
        );
        Ok(report)
    }

    pub fn tag(&mut self) -> Result<Version, EngineError> {
        VersionTracker::tag(&mut self.store)
    }

    /// `-1` before anything was written, `0` before the first tag, else the
    /// tagged number.
    pub fn current_version(&self) -> Result<Version, EngineError> {
        Ok(self.version_state()?.number())
    }

    pub fn version_state(&self) -> Result<VersionState, EngineError> {
        VersionTracker::current(&self.store)
    }

    pub fn live_state_as_of(&self, version: Version) -> Result<LiveState, EngineError> {
        HistoryReplay::live_state_as_of(&self.store, version)
    }

    /// msgpack snapshot of the state at `version`, for audits.
    pub fn export_snapshot(&self, version: Version) -> Result<Vec<u8>, EngineError> {
        Ok(self.live_state_as_of(version)?.to_msgpack()?)
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    fn live_now(&self) -> Result<LiveState, EngineError> {
        self.live_state_as_of(self.version_state()?.working())
    }

    /// Live nodes at the current version. `Package` and `Code` count the
    /// levels of live source chains.
    pub fn node_count(&self, node_type: Option<&str>) -> Result<u64, EngineError> {
        let live = self.live_now()?;
        let count = match node_type {
            None => live.nodes.len(),
            Some(PACKAGE_LABEL) => live
                .sources
                .keys()
                .map(|k| (&k.issue, &k.package))
                .collect::<BTreeSet<_>>()
                .len(),
            Some(CODE_LABEL) => live.sources.len(),
            Some(t) => live.nodes.values().filter(|n| n.node_type == t).count(),
        };
        Ok(count as u64)
    }

    /// Live links at the current version. `IMPLEMENTS` and `CONTAINED_BY`
    /// count the relationships of live source chains.
    pub fn link_count(&self, kind: Option<&str>) -> Result<u64, EngineError> {
        let live = self.live_now()?;
        let count = match kind {
            None => live.links.len(),
            Some(IMPLEMENTS) => live
                .sources
                .keys()
                .map(|k| (&k.issue, &k.package))
                .collect::<BTreeSet<_>>()
                .len(),
            Some(CONTAINED_BY) => live.sources.len(),
            Some(k) => live.links.values().filter(|l| l.kind == k).count(),
        };
        Ok(count as u64)
    }

    pub fn pass_history(&self) -> Result<Vec<PassRecord>, EngineError> {
        Ok(self.store.pass_history()?)
    }

    /// Wipe the store and the staging buffer.
    pub fn clear_all(&mut self) -> Result<(), EngineError> {
        self.store.clear_all()?;
        self.staging.clear();
        self.phase = ReconcilePhase::Idle;
        Ok(())
    }
}
