use tracegraph_core::{
    ChangeRecord, Entity, Link, LinkKey, Node, NodeKey, PassId, Source, SourceKey, Version,
};

use crate::error::StorageError;

/// A stored entity together with its change log, ordered by version.
#[derive(Debug, Clone)]
pub struct History<T: Entity> {
    pub entity: T,
    pub changes: Vec<ChangeRecord>,
}

impl<T: Entity> History<T> {
    pub fn new(entity: T) -> Self {
        Self {
            entity,
            changes: Vec::new(),
        }
    }

    /// Version of the oldest record, if any.
    pub fn first_version(&self) -> Option<Version> {
        self.changes.iter().map(|c| c.version).min()
    }
}

/// Audit row written once per successful reconcile pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassRecord {
    pub pass_id: PassId,
    pub version: Version,
    pub added: u64,
    pub removed: u64,
    pub modified: u64,
    pub recorded_at: i64,
}

/// One mutation of the graph store. A slice of these is applied atomically.
#[derive(Debug, Clone)]
pub enum GraphWrite {
    /// Create the node if absent; an existing stored payload is kept.
    MergeNode(Node),
    /// Create the link if no link exists between the same endpoints.
    MergeLink(Link),
    /// Create the `IMPLEMENTS` and `CONTAINED_BY` chain if absent.
    MergeSource(Source),
    LogNodeChange {
        id: NodeKey,
        change: ChangeRecord,
    },
    LogLinkChange {
        key: LinkKey,
        change: ChangeRecord,
    },
    LogSourceChange {
        key: SourceKey,
        change: ChangeRecord,
    },
    /// Hard delete, cascading to links, sources and change records.
    DeleteNode(NodeKey),
    DeleteLink(LinkKey),
    DeleteSource(SourceKey),
    /// Drop every change record stamped with the version.
    ClearChangesAt(Version),
    SetCheckpoint(Version),
    EnsureTypeIndex(String),
    /// Drop registry rows for types no stored node or `ADD` record still uses.
    PruneTypeIndex,
    RecordPass(PassRecord),
}

pub trait GraphStore {
    /// Apply all writes in one transaction: either every write lands or none does.
    fn apply(&mut self, writes: &[GraphWrite]) -> Result<(), StorageError>;

    fn node_history(&self) -> Result<Vec<History<Node>>, StorageError>;

    fn link_history(&self) -> Result<Vec<History<Link>>, StorageError>;

    fn source_history(&self) -> Result<Vec<History<Source>>, StorageError>;

    fn checkpoint(&self) -> Result<Option<Version>, StorageError>;

    /// Raw count of stored nodes regardless of history. `Package` and `Code`
    /// count the levels of the source chain.
    fn stored_node_count(&self, node_type: Option<&str>) -> Result<u64, StorageError>;

    /// Raw count of stored links. `IMPLEMENTS` and `CONTAINED_BY` count the
    /// relationships of the source chain.
    fn stored_link_count(&self, kind: Option<&str>) -> Result<u64, StorageError>;

    fn change_count_at(&self, version: Version) -> Result<u64, StorageError>;

    fn indexed_types(&self) -> Result<Vec<String>, StorageError>;

    fn pass_history(&self) -> Result<Vec<PassRecord>, StorageError>;

    fn clear_all(&mut self) -> Result<(), StorageError>;
}
