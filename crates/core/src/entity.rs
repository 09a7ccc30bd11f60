use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::version::Version;

/// Label of the package level of a source attachment chain.
pub const PACKAGE_LABEL: &str = "Package";
/// Label of the file level of a source attachment chain.
pub const CODE_LABEL: &str = "Code";
/// Relationship from an issue node to a package.
pub const IMPLEMENTS: &str = "IMPLEMENTS";
/// Relationship from a package to a code file.
pub const CONTAINED_BY: &str = "CONTAINED_BY";

/// Node types that belong to the source tree and may not be staged as domain nodes.
pub const RESERVED_NODE_TYPES: [&str; 2] = [PACKAGE_LABEL, CODE_LABEL];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Node,
    Link,
    Source,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Link => "link",
            Self::Source => "source",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Add,
    Remove,
    Modified,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Remove => "REMOVE",
            Self::Modified => "MODIFIED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "ADD" => Ok(Self::Add),
            "REMOVE" => Ok(Self::Remove),
            "MODIFIED" => Ok(Self::Modified),
            _ => Err(CoreError::InvalidData(format!("unknown change kind: {s}"))),
        }
    }

    /// ADD and REMOVE decide liveness; MODIFIED only replaces content.
    pub fn is_transition(&self) -> bool {
        !matches!(self, Self::Modified)
    }
}

/// One entry of the append-only `UPDATES` log attached to an entity.
///
/// `label` is the node type or link kind the entity was (re)added with. It is
/// only set on `ADD` records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    pub version: Version,
    pub data: Option<Vec<u8>>,
    pub label: Option<String>,
}

impl ChangeRecord {
    pub fn add(version: Version, data: Option<Vec<u8>>) -> Self {
        Self {
            kind: ChangeKind::Add,
            version,
            data,
            label: None,
        }
    }

    pub fn remove(version: Version) -> Self {
        Self {
            kind: ChangeKind::Remove,
            version,
            data: None,
            label: None,
        }
    }

    pub fn modified(version: Version, data: Vec<u8>) -> Self {
        Self {
            kind: ChangeKind::Modified,
            version,
            data: Some(data),
            label: None,
        }
    }

    pub fn labelled(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }
}

/// Shared behaviour of the three versioned entity shapes.
///
/// `payload` is the part of an entity that may change without changing its
/// identity; `with_payload` rebuilds the entity from a logged payload during
/// replay.
pub trait Entity: Clone + fmt::Debug {
    type Key: Ord + Clone + fmt::Debug + fmt::Display;

    const KIND: EntityKind;

    fn key(&self) -> Self::Key;

    fn payload(&self) -> Option<Vec<u8>>;

    fn with_payload(self, payload: &[u8]) -> Result<Self, CoreError>;

    fn same_content(&self, other: &Self) -> bool;

    /// Node type or link kind, logged on `ADD` so a re-added entity replays
    /// with the shape it was staged in.
    fn label(&self) -> Option<String> {
        None
    }

    fn with_label(self, _label: &str) -> Self {
        self
    }
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeKey(String);

impl NodeKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeKey({})", self.0)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeKey,
    pub node_type: String,
    pub data: Vec<u8>,
}

impl Node {
    pub fn new(id: &str, node_type: &str, data: impl Into<Vec<u8>>) -> Result<Self, CoreError> {
        if id.is_empty() {
            return Err(CoreError::InvalidEntity("node id must not be empty".into()));
        }
        if node_type.is_empty() {
            return Err(CoreError::InvalidEntity(format!("node {id} has an empty type")));
        }
        if RESERVED_NODE_TYPES.contains(&node_type) {
            return Err(CoreError::ReservedNodeType(node_type.to_string()));
        }
        Ok(Self {
            id: NodeKey::new(id),
            node_type: node_type.to_string(),
            data: data.into(),
        })
    }

    /// Content digest used when deciding whether a node was modified.
    pub fn content_hash(&self) -> blake3::Hash {
        blake3::hash(&self.data)
    }
}

impl Entity for Node {
    type Key = NodeKey;

    const KIND: EntityKind = EntityKind::Node;

    fn key(&self) -> NodeKey {
        self.id.clone()
    }

    fn payload(&self) -> Option<Vec<u8>> {
        Some(self.data.clone())
    }

    fn with_payload(mut self, payload: &[u8]) -> Result<Self, CoreError> {
        self.data = payload.to_vec();
        Ok(self)
    }

    fn same_content(&self, other: &Self) -> bool {
        self.content_hash() == other.content_hash()
    }

    fn label(&self) -> Option<String> {
        Some(self.node_type.clone())
    }

    fn with_label(mut self, label: &str) -> Self {
        self.node_type = label.to_string();
        self
    }
}

/// Identity of a link. The link kind is deliberately not part of it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkKey {
    pub source: NodeKey,
    pub target: NodeKey,
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.source, self.target)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub source: NodeKey,
    pub kind: String,
    pub target: NodeKey,
}

impl Link {
    pub fn new(source: &str, kind: &str, target: &str) -> Result<Self, CoreError> {
        if source.is_empty() || target.is_empty() {
            return Err(CoreError::InvalidEntity(format!(
                "link {source:?} -> {target:?} has an empty endpoint"
            )));
        }
        if kind.is_empty() {
            return Err(CoreError::InvalidEntity(format!(
                "link {source} -> {target} has an empty kind"
            )));
        }
        Ok(Self {
            source: NodeKey::new(source),
            kind: kind.to_string(),
            target: NodeKey::new(target),
        })
    }
}

impl Entity for Link {
    type Key = LinkKey;

    const KIND: EntityKind = EntityKind::Link;

    fn key(&self) -> LinkKey {
        LinkKey {
            source: self.source.clone(),
            target: self.target.clone(),
        }
    }

    fn payload(&self) -> Option<Vec<u8>> {
        None
    }

    fn with_payload(self, _payload: &[u8]) -> Result<Self, CoreError> {
        Ok(self)
    }

    // A changed kind on the same endpoints is not a modification.
    fn same_content(&self, _other: &Self) -> bool {
        true
    }

    fn label(&self) -> Option<String> {
        Some(self.kind.clone())
    }

    fn with_label(mut self, label: &str) -> Self {
        self.kind = label.to_string();
        self
    }
}

/// Identity of a source attachment: the commit is content, not identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceKey {
    pub package: String,
    pub file: String,
    pub issue: NodeKey,
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.issue, self.package, self.file)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub package: String,
    pub file: String,
    pub commit: String,
    pub issue: NodeKey,
}

impl Source {
    pub fn new(package: &str, file: &str, commit: &str, issue: &str) -> Result<Self, CoreError> {
        if package.is_empty() || file.is_empty() || issue.is_empty() {
            return Err(CoreError::InvalidEntity(format!(
                "source {package:?}/{file:?} for issue {issue:?} is incomplete"
            )));
        }
        Ok(Self {
            package: package.to_string(),
            file: file.to_string(),
            commit: commit.to_string(),
            issue: NodeKey::new(issue),
        })
    }
}

impl Entity for Source {
    type Key = SourceKey;

    const KIND: EntityKind = EntityKind::Source;

    fn key(&self) -> SourceKey {
        SourceKey {
            package: self.package.clone(),
            file: self.file.clone(),
            issue: self.issue.clone(),
        }
    }

    fn payload(&self) -> Option<Vec<u8>> {
        Some(self.commit.as_bytes().to_vec())
    }

    fn with_payload(mut self, payload: &[u8]) -> Result<Self, CoreError> {
        self.commit = String::from_utf8(payload.to_vec())
            .map_err(|e| CoreError::InvalidData(format!("commit hash is not utf-8: {e}")))?;
        Ok(self)
    }

    fn same_content(&self, other: &Self) -> bool {
        self.commit == other.commit
    }
}
