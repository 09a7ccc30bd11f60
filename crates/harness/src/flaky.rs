use tracegraph_core::{Link, Node, Source, Version};
use tracegraph_storage::{GraphStore, GraphWrite, History, PassRecord, StorageError};

/// Store wrapper that starts refusing writes after a set number of batches,
/// standing in for a backend that drops its connection mid-pass.
pub struct FlakyStore<S: GraphStore> {
    inner: S,
    applies_left: Option<usize>,
}

impl<S: GraphStore> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            applies_left: None,
        }
    }

    /// Let `n` more batches through, then fail every one after.
    pub fn fail_after(&mut self, n: usize) {
        self.applies_left = Some(n);
    }

    pub fn heal(&mut self) {
        self.applies_left = None;
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: GraphStore> GraphStore for FlakyStore<S> {
    fn apply(&mut self, writes: &[GraphWrite]) -> Result<(), StorageError> {
        match self.applies_left {
            Some(0) => return Err(StorageError::Unavailable("connection reset".into())),
            Some(ref mut n) => *n -= 1,
            None => {}
        }
        self.inner.apply(writes)
    }

    fn node_history(&self) -> Result<Vec<History<Node>>, StorageError> {
        self.inner.node_history()
    }

    fn link_history(&self) -> Result<Vec<History<Link>>, StorageError> {
        self.inner.link_history()
    }

    fn source_history(&self) -> Result<Vec<History<Source>>, StorageError> {
        self.inner.source_history()
    }

    fn checkpoint(&self) -> Result<Option<Version>, StorageError> {
        self.inner.checkpoint()
    }

    fn stored_node_count(&self, node_type: Option<&str>) -> Result<u64, StorageError> {
        self.inner.stored_node_count(node_type)
    }

    fn stored_link_count(&self, kind: Option<&str>) -> Result<u64, StorageError> {
        self.inner.stored_link_count(kind)
    }

    fn change_count_at(&self, version: Version) -> Result<u64, StorageError> {
        self.inner.change_count_at(version)
    }

    fn indexed_types(&self) -> Result<Vec<String>, StorageError> {
        self.inner.indexed_types()
    }

    fn pass_history(&self) -> Result<Vec<PassRecord>, StorageError> {
        self.inner.pass_history()
    }

    fn clear_all(&mut self) -> Result<(), StorageError> {
        self.inner.clear_all()
    }
}
