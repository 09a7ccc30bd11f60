use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, Link, LinkKey, Node, NodeKey, Source, SourceKey};
use crate::error::CoreError;

/// The nodes, links and sources that were live at one version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveState {
    pub nodes: BTreeMap<NodeKey, Node>,
    pub links: BTreeMap<LinkKey, Link>,
    pub sources: BTreeMap<SourceKey, Source>,
}

/// Flat wire form of a [`LiveState`].
#[derive(Serialize, Deserialize)]
struct Snapshot {
    nodes: Vec<Node>,
    links: Vec<Link>,
    sources: Vec<Source>,
}

fn index<T: Entity>(items: Vec<T>) -> BTreeMap<T::Key, T> {
    items.into_iter().map(|e| (e.key(), e)).collect()
}

impl LiveState {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty() && self.sources.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(&NodeKey::from(id))
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, CoreError> {
        let snapshot = Snapshot {
            nodes: self.nodes.values().cloned().collect(),
            links: self.links.values().cloned().collect(),
            sources: self.sources.values().cloned().collect(),
        };
        rmp_serde::to_vec(&snapshot).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, CoreError> {
        let snapshot: Snapshot =
            rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))?;
        Ok(Self {
            nodes: index(snapshot.nodes),
            links: index(snapshot.links),
            sources: index(snapshot.sources),
        })
    }
}
