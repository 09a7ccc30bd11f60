use std::collections::BTreeMap;

use tracegraph_core::{CoreError, Entity, Link, LinkKey, Node, NodeKey, Source, SourceKey};

/// The producer's proposed next state, awaiting reconciliation.
///
/// Each set is keyed on entity identity, so staging the same key twice in one
/// pass keeps the last call.
#[derive(Debug, Clone, Default)]
pub struct StagingBuffer {
    nodes: BTreeMap<NodeKey, Node>,
    links: BTreeMap<LinkKey, Link>,
    sources: BTreeMap<SourceKey, Source>,
}

impl StagingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage_node(&mut self, id: &str, node_type: &str, data: &[u8]) -> Result<(), CoreError> {
        let node = Node::new(id, node_type, data.to_vec())?;
        self.nodes.insert(node.key(), node);
        Ok(())
    }

    pub fn stage_link(&mut self, source: &str, kind: &str, target: &str) -> Result<(), CoreError> {
        let link = Link::new(source, kind, target)?;
        self.links.insert(link.key(), link);
        Ok(())
    }

    pub fn stage_source(
        &mut self,
        package: &str,
        file: &str,
        commit: &str,
        issue: &str,
    ) -> Result<(), CoreError> {
        let source = Source::new(package, file, commit, issue)?;
        self.sources.insert(source.key(), source);
        Ok(())
    }

    pub fn nodes(&self) -> &BTreeMap<NodeKey, Node> {
        &self.nodes
    }

    pub fn links(&self) -> &BTreeMap<LinkKey, Link> {
        &self.links
    }

    pub fn sources(&self) -> &BTreeMap<SourceKey, Source> {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty() && self.sources.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.links.clear();
        self.sources.clear();
    }
}
