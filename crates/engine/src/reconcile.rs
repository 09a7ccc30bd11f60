use std::collections::BTreeSet;

use tracing::{debug, error, warn};

use tracegraph_core::{
    ChangeRecord, Diff, DiffSummary, Entity, LinkKey, LiveState, NodeKey, PassId, SourceKey,
    Version, diff, now_ms,
};
use tracegraph_storage::{GraphStore, GraphWrite, PassRecord};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::replay::HistoryReplay;
use crate::staging::StagingBuffer;
use crate::version::VersionTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePhase {
    Idle,
    RollingBack,
    Replaying,
    Diffing,
    Applying,
    Failed,
}

impl ReconcilePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::RollingBack => "rolling_back",
            Self::Replaying => "replaying",
            Self::Diffing => "diffing",
            Self::Applying => "applying",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeCounts {
    pub added: u64,
    pub removed: u64,
    pub modified: u64,
}

impl ChangeCounts {
    fn record<T: Entity>(&mut self, diff: &Diff<T>) {
        self.added += diff.added.len() as u64;
        self.removed += diff.removed.len() as u64;
        self.modified += diff.modified.len() as u64;
    }

    pub fn total(&self) -> u64 {
        self.added + self.removed + self.modified
    }
}

/// Outcome of one reconcile pass.
///
/// The per-kind summaries describe what this call changed in the live state
/// at `version`; `logged` counts the records written at `version`, which are
/// always measured against the last tagged state.
#[derive(Debug, Clone)]
pub struct ReconcileReport {
    pub pass_id: PassId,
    pub version: Version,
    pub nodes: DiffSummary<NodeKey>,
    pub links: DiffSummary<LinkKey>,
    pub sources: DiffSummary<SourceKey>,
    pub logged: ChangeCounts,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty() && self.sources.is_empty()
    }

    pub fn counts(&self) -> ChangeCounts {
        ChangeCounts {
            added: (self.nodes.added.len() + self.links.added.len() + self.sources.added.len())
                as u64,
            removed: (self.nodes.removed.len()
                + self.links.removed.len()
                + self.sources.removed.len()) as u64,
            modified: (self.nodes.modified.len()
                + self.links.modified.len()
                + self.sources.modified.len()) as u64,
        }
    }
}

/// Drives one pass: roll back provisional work, replay committed state,
/// diff against the staging buffer, then apply and log the result.
pub struct DiffReconciler<'a, S: GraphStore> {
    store: &'a mut S,
    config: &'a EngineConfig,
    phase: ReconcilePhase,
}

impl<'a, S: GraphStore> DiffReconciler<'a, S> {
    pub fn new(store: &'a mut S, config: &'a EngineConfig) -> Self {
        Self {
            store,
            config,
            phase: ReconcilePhase::Idle,
        }
    }

    pub fn phase(&self) -> ReconcilePhase {
        self.phase
    }

    fn enter(&mut self, phase: ReconcilePhase) {
        debug!(from = self.phase.as_str(), to = phase.as_str(), "reconcile phase");
        self.phase = phase;
    }

    pub fn run(&mut self, staging: &StagingBuffer) -> Result<ReconcileReport, EngineError> {
        match self.run_phases(staging) {
            Ok(report) => {
                self.enter(ReconcilePhase::Idle);
                Ok(report)
            }
            Err(e) => {
                error!(phase = self.phase.as_str(), error = %e, "reconcile failed");
                self.phase = ReconcilePhase::Failed;
                Err(e)
            }
        }
    }

    fn run_phases(&mut self, staging: &StagingBuffer) -> Result<ReconcileReport, EngineError> {
        let desired = self.desired_state(staging)?;
        let working = VersionTracker::current(&*self.store)?.working();
        let pass_id = PassId::new();

        self.enter(ReconcilePhase::RollingBack);
        let history = HistoryReplay::load(&*self.store)?;
        let previous = history.live_at(working)?;
        let births = history.provisional_births(working)?;
        let mut rollback = Vec::new();
        rollback.extend(births.sources.into_iter().map(GraphWrite::DeleteSource));
        rollback.extend(births.links.into_iter().map(GraphWrite::DeleteLink));
        rollback.extend(births.nodes.into_iter().map(GraphWrite::DeleteNode));
        let discarded = rollback.len();
        rollback.push(GraphWrite::ClearChangesAt(working));
        rollback.push(GraphWrite::PruneTypeIndex);
        self.store.apply(&rollback)?;
        debug!(version = working, discarded, "provisional changes rolled back");

        self.enter(ReconcilePhase::Replaying);
        let committed = HistoryReplay::live_state_as_of(&*self.store, working)?;

        self.enter(ReconcilePhase::Diffing);
        let node_diff = diff(&desired.nodes, &committed.nodes);
        let link_diff = diff(&desired.links, &committed.links);
        let source_diff = diff(&desired.sources, &committed.sources);

        self.enter(ReconcilePhase::Applying);
        let mut logged = ChangeCounts::default();
        logged.record(&node_diff);
        logged.record(&link_diff);
        logged.record(&source_diff);

        let mut writes = Vec::new();
        log_diff(
            &node_diff,
            working,
            |n| GraphWrite::MergeNode(n.clone()),
            |id, change| GraphWrite::LogNodeChange { id, change },
            &mut writes,
        );
        let new_types: BTreeSet<&str> =
            node_diff.added.iter().map(|n| n.node_type.as_str()).collect();
        writes.extend(
            new_types
                .into_iter()
                .map(|t| GraphWrite::EnsureTypeIndex(t.to_string())),
        );
        log_diff(
            &link_diff,
            working,
            |l| GraphWrite::MergeLink(l.clone()),
            |key, change| GraphWrite::LogLinkChange { key, change },
            &mut writes,
        );
        log_diff(
            &source_diff,
            working,
            |s| GraphWrite::MergeSource(s.clone()),
            |key, change| GraphWrite::LogSourceChange { key, change },
            &mut writes,
        );
        if self.config.record_passes {
            writes.push(GraphWrite::RecordPass(PassRecord {
                pass_id,
                version: working,
                added: logged.added,
                removed: logged.removed,
                modified: logged.modified,
                recorded_at: now_ms()?,
            }));
        }
        self.store.apply(&writes)?;

        Ok(ReconcileReport {
            pass_id,
            version: working,
            nodes: diff(&desired.nodes, &previous.nodes).summary(),
            links: diff(&desired.links, &previous.links).summary(),
            sources: diff(&desired.sources, &previous.sources).summary(),
            logged,
        })
    }

    /// The staged state with reference checks applied.
    fn desired_state(&self, staging: &StagingBuffer) -> Result<LiveState, EngineError> {
        let nodes = staging.nodes().clone();
        let mut links = staging.links().clone();
        let mut sources = staging.sources().clone();

        let dangling_links: Vec<LinkKey> = links
            .keys()
            .filter(|k| !nodes.contains_key(&k.source) || !nodes.contains_key(&k.target))
            .cloned()
            .collect();
        let dangling_sources: Vec<SourceKey> = sources
            .keys()
            .filter(|k| !nodes.contains_key(&k.issue))
            .cloned()
            .collect();

        if self.config.strict_references {
            if let Some(key) = dangling_links.first() {
                return Err(EngineError::DanglingLink {
                    source_id: key.source.to_string(),
                    target_id: key.target.to_string(),
                });
            }
            if let Some(key) = dangling_sources.first() {
                return Err(EngineError::DanglingSource {
                    package: key.package.clone(),
                    file: key.file.clone(),
                    issue: key.issue.to_string(),
                });
            }
        }
        for key in &dangling_links {
            warn!(link = %key, "skipping link to unstaged node");
            links.remove(key);
        }
        for key in &dangling_sources {
            warn!(source = %key, "skipping source for unstaged issue");
            sources.remove(key);
        }

        Ok(LiveState {
            nodes,
            links,
            sources,
        })
    }
}

/// Append the merge and `UPDATES` writes for one entity kind.
fn log_diff<T: Entity>(
    diff: &Diff<T>,
    version: Version,
    merge: impl Fn(&T) -> GraphWrite,
    log: impl Fn(T::Key, ChangeRecord) -> GraphWrite,
    writes: &mut Vec<GraphWrite>,
) {
    for entity in &diff.added {
        writes.push(merge(entity));
        let change = ChangeRecord::add(version, entity.payload())
            .labelled(entity.label());
        writes.push(log(entity.key(), change));
    }
    for entity in &diff.removed {
        writes.push(log(entity.key(), ChangeRecord::remove(version)));
    }
    for entity in &diff.modified {
        if let Some(payload) = entity.payload() {
            writes.push(log(entity.key(), ChangeRecord::modified(version, payload)));
        }
    }
}
