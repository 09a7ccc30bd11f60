use std::collections::BTreeMap;

use crate::entity::Entity;

/// Result of comparing a staged state against a committed one.
///
/// `modified` carries the staged (new) entity.
#[derive(Debug, Clone)]
pub struct Diff<T: Entity> {
    pub added: Vec<T>,
    pub removed: Vec<T>,
    pub modified: Vec<T>,
    pub unchanged: Vec<T::Key>,
}

impl<T: Entity> Default for Diff<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            modified: Vec::new(),
            unchanged: Vec::new(),
        }
    }
}

impl<T: Entity> Diff<T> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    pub fn summary(&self) -> DiffSummary<T::Key> {
        DiffSummary {
            added: self.added.iter().map(Entity::key).collect(),
            removed: self.removed.iter().map(Entity::key).collect(),
            modified: self.modified.iter().map(Entity::key).collect(),
        }
    }
}

/// Keys of a [`Diff`], without the entity payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSummary<K> {
    pub added: Vec<K>,
    pub removed: Vec<K>,
    pub modified: Vec<K>,
}

impl<K> Default for DiffSummary<K> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            modified: Vec::new(),
        }
    }
}

impl<K> DiffSummary<K> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Three-way diff keyed on entity identity.
pub fn diff<T: Entity>(
    staged: &BTreeMap<T::Key, T>,
    committed: &BTreeMap<T::Key, T>,
) -> Diff<T> {
    let mut out = Diff::default();
    for (key, entity) in staged {
        match committed.get(key) {
            None => out.added.push(entity.clone()),
            Some(prev) if !entity.same_content(prev) => out.modified.push(entity.clone()),
            Some(_) => out.unchanged.push(key.clone()),
        }
    }
    for (key, entity) in committed {
        if !staged.contains_key(key) {
            out.removed.push(entity.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Link, Node, NodeKey, Source};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn nodes(items: &[(&str, &[u8])]) -> BTreeMap<NodeKey, Node> {
        items
            .iter()
            .map(|(id, data)| {
                let n = Node::new(id, "Requirement", data.to_vec()).unwrap();
                (n.key(), n)
            })
            .collect()
    }

    #[test]
    fn classifies_added_removed_modified() {
        let committed = nodes(&[("ISSUE-1", b"v1"), ("ISSUE-3", b"z")]);
        let staged = nodes(&[("ISSUE-1", b"v2"), ("ISSUE-2", b"x")]);

        let d = diff(&staged, &committed);
        let s = d.summary();
        assert_eq!(s.added, vec![NodeKey::from("ISSUE-2")]);
        assert_eq!(s.modified, vec![NodeKey::from("ISSUE-1")]);
        assert_eq!(s.removed, vec![NodeKey::from("ISSUE-3")]);
        assert_eq!(d.modified[0].data, b"v2".to_vec());
        assert!(d.unchanged.is_empty());
    }

    #[test]
    fn link_kind_change_is_unchanged() {
        let a = Link::new("A", "TRACES", "B").unwrap();
        let b = Link::new("A", "MITIGATES", "B").unwrap();
        let committed = BTreeMap::from([(a.key(), a)]);
        let staged = BTreeMap::from([(b.key(), b)]);

        let d = diff(&staged, &committed);
        assert!(d.is_empty());
        assert_eq!(d.unchanged.len(), 1);
    }

    #[test]
    fn source_commit_change_is_modified() {
        let a = Source::new("com.foo", "Bar.java", "abc123", "ISSUE-1").unwrap();
        let b = Source::new("com.foo", "Bar.java", "def456", "ISSUE-1").unwrap();
        let committed = BTreeMap::from([(a.key(), a)]);
        let staged = BTreeMap::from([(b.key(), b)]);

        let d = diff(&staged, &committed);
        assert_eq!(d.modified.len(), 1);
        assert_eq!(d.modified[0].commit, "def456");
    }

    fn node_map() -> impl Strategy<Value = BTreeMap<NodeKey, Node>> {
        prop::collection::btree_map("[a-f]{1,2}", prop::collection::vec(0u8..3, 0..3), 0..12)
            .prop_map(|m| {
                m.into_iter()
                    .map(|(id, data)| {
                        let n = Node::new(&id, "Hazard", data).unwrap();
                        (n.key(), n)
                    })
                    .collect()
            })
    }

    proptest! {
        #[test]
        fn diff_partitions_the_union(staged in node_map(), committed in node_map()) {
            let d = diff(&staged, &committed);

            let mut seen = BTreeSet::new();
            let buckets = d.added.iter().map(Entity::key)
                .chain(d.removed.iter().map(Entity::key))
                .chain(d.modified.iter().map(Entity::key))
                .chain(d.unchanged.iter().cloned());
            for key in buckets {
                prop_assert!(seen.insert(key), "key classified twice");
            }

            let union: BTreeSet<NodeKey> = staged.keys().chain(committed.keys()).cloned().collect();
            prop_assert_eq!(seen, union);
        }
    }
}
