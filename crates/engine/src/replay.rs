//! Reconstruction of the graph as of a version by walking the change log.

use std::collections::{BTreeMap, BTreeSet};

use tracegraph_core::{
    ChangeKind, Entity, Link, LinkKey, LiveState, Node, NodeKey, Source, SourceKey, Version,
};
use tracegraph_storage::{GraphStore, History};

use crate::error::EngineError;

/// Keys of entities whose whole history starts at the working version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionalBirths {
    pub nodes: Vec<NodeKey>,
    pub links: Vec<LinkKey>,
    pub sources: Vec<SourceKey>,
}

impl ProvisionalBirths {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty() && self.sources.is_empty()
    }
}

/// Every stored entity with its change log, read once from the store.
pub struct HistoryReplay {
    nodes: Vec<History<Node>>,
    links: Vec<History<Link>>,
    sources: Vec<History<Source>>,
}

impl HistoryReplay {
    pub fn load<S: GraphStore>(store: &S) -> Result<Self, EngineError> {
        Ok(Self {
            nodes: store.node_history()?,
            links: store.link_history()?,
            sources: store.source_history()?,
        })
    }

    /// Convenience for one-off audits: load and replay in a single call.
    pub fn live_state_as_of<S: GraphStore>(
        store: &S,
        version: Version,
    ) -> Result<LiveState, EngineError> {
        Self::load(store)?.live_at(version)
    }

    pub fn live_at(&self, version: Version) -> Result<LiveState, EngineError> {
        Ok(LiveState {
            nodes: replay_all(&self.nodes, version)?,
            links: replay_all(&self.links, version)?,
            sources: replay_all(&self.sources, version)?,
        })
    }

    /// Entities live at `working` but not at `working - 1` whose first record
    /// is at `working`. Entities re-added after an earlier removal are not
    /// included: dropping their records at `working` restores them.
    pub fn provisional_births(&self, working: Version) -> Result<ProvisionalBirths, EngineError> {
        let now = self.live_at(working)?;
        let before = self.live_at(working - 1)?;
        Ok(ProvisionalBirths {
            nodes: born_at(&self.nodes, &now.nodes, &before.nodes, working),
            links: born_at(&self.links, &now.links, &before.links, working),
            sources: born_at(&self.sources, &now.sources, &before.sources, working),
        })
    }
}

fn born_at<T: Entity>(
    histories: &[History<T>],
    now: &BTreeMap<T::Key, T>,
    before: &BTreeMap<T::Key, T>,
    version: Version,
) -> Vec<T::Key> {
    histories
        .iter()
        .filter(|h| h.first_version() == Some(version))
        .map(|h| h.entity.key())
        .filter(|k| now.contains_key(k) && !before.contains_key(k))
        .collect()
}

fn replay_all<T: Entity>(
    histories: &[History<T>],
    target: Version,
) -> Result<BTreeMap<T::Key, T>, EngineError> {
    let mut live = BTreeMap::new();
    for history in histories {
        if let Some(entity) = replay_entity(history, target)? {
            live.insert(entity.key(), entity);
        }
    }
    Ok(live)
}

fn check_consistent<T: Entity>(history: &History<T>) -> Result<(), EngineError> {
    let mut seen = BTreeSet::new();
    for change in &history.changes {
        if !seen.insert(change.version) {
            return Err(EngineError::InconsistentReplay {
                kind: T::KIND,
                key: history.entity.key().to_string(),
                reason: format!(
                    "more than one record at version {} ({})",
                    change.version,
                    change.kind.as_str()
                ),
            });
        }
    }
    Ok(())
}

/// The entity as it stood at `target`, or `None` if it was not live then.
fn replay_entity<T: Entity>(
    history: &History<T>,
    target: Version,
) -> Result<Option<T>, EngineError> {
    check_consistent(history)?;

    let first_add = history
        .changes
        .iter()
        .filter(|c| c.kind == ChangeKind::Add)
        .map(|c| c.version)
        .min();
    if !first_add.is_some_and(|v| v <= target) {
        return Ok(None);
    }

    let latest_transition = history
        .changes
        .iter()
        .filter(|c| c.version <= target && c.kind.is_transition())
        .max_by_key(|c| c.version);
    if !latest_transition.is_some_and(|c| c.kind == ChangeKind::Add) {
        return Ok(None);
    }

    let content = history
        .changes
        .iter()
        .filter(|c| c.version <= target)
        .filter_map(|c| c.data.as_deref().map(|d| (c.version, d)))
        .max_by_key(|(v, _)| *v);

    // The type or kind comes from the ADD that made the entity live.
    let entity = match latest_transition.and_then(|c| c.label.as_deref()) {
        Some(label) => history.entity.clone().with_label(label),
        None => history.entity.clone(),
    };
    match content {
        Some((_, payload)) => Ok(Some(entity.with_payload(payload)?)),
        None => Ok(Some(entity)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracegraph_core::ChangeRecord;

    fn node_history(changes: Vec<ChangeRecord>) -> History<Node> {
        History {
            entity: Node::new("ISSUE-1", "Requirement", b"stored".to_vec()).unwrap(),
            changes,
        }
    }

    fn live(history: &History<Node>, version: Version) -> Option<Vec<u8>> {
        replay_entity(history, version).unwrap().map(|n| n.data)
    }

    #[test]
    fn added_later_is_not_live_yet() {
        let h = node_history(vec![ChangeRecord::add(2, None)]);
        assert_eq!(live(&h, 1), None);
        assert_eq!(live(&h, 2), Some(b"stored".to_vec()));
    }

    #[test]
    fn removal_hides_from_its_version_on() {
        let h = node_history(vec![ChangeRecord::add(0, None), ChangeRecord::remove(2)]);
        assert!(live(&h, 1).is_some());
        assert_eq!(live(&h, 2), None);
        assert_eq!(live(&h, 5), None);
    }

    #[test]
    fn content_follows_modifications() {
        let h = node_history(vec![
            ChangeRecord::add(0, Some(b"v1".to_vec())),
            ChangeRecord::modified(2, b"v2".to_vec()),
            ChangeRecord::modified(4, b"v3".to_vec()),
        ]);
        assert_eq!(live(&h, 0), Some(b"v1".to_vec()));
        assert_eq!(live(&h, 3), Some(b"v2".to_vec()));
        assert_eq!(live(&h, 9), Some(b"v3".to_vec()));
    }

    #[test]
    fn readd_after_removal_uses_new_content() {
        let h = node_history(vec![
            ChangeRecord::add(0, Some(b"v1".to_vec())),
            ChangeRecord::remove(1),
            ChangeRecord::add(3, Some(b"v4".to_vec())),
        ]);
        assert_eq!(live(&h, 2), None);
        assert_eq!(live(&h, 3), Some(b"v4".to_vec()));
    }

    #[test]
    fn readd_takes_the_type_it_was_added_with() {
        let h = node_history(vec![
            ChangeRecord::add(0, Some(b"v1".to_vec()))
                .labelled(Some("Requirement".into())),
            ChangeRecord::remove(1),
            ChangeRecord::add(2, Some(b"v1".to_vec()))
                .labelled(Some("Hazard".into())),
        ]);
        let node_type = |v| replay_entity(&h, v).unwrap().map(|n| n.node_type);
        assert_eq!(node_type(0).as_deref(), Some("Requirement"));
        assert_eq!(node_type(1), None);
        assert_eq!(node_type(2).as_deref(), Some("Hazard"));
    }

    #[test]
    fn modified_without_add_is_not_live() {
        let h = node_history(vec![ChangeRecord::modified(0, b"v1".to_vec())]);
        assert_eq!(live(&h, 4), None);
    }

    #[test]
    fn births_skip_readded_entities() {
        let readded = node_history(vec![
            ChangeRecord::add(0, Some(b"v1".to_vec())),
            ChangeRecord::remove(1),
            ChangeRecord::add(2, Some(b"v2".to_vec())),
        ]);
        let fresh = History {
            entity: Node::new("ISSUE-2", "Hazard", b"x".to_vec()).unwrap(),
            changes: vec![ChangeRecord::add(2, Some(b"x".to_vec()))],
        };
        let replay = HistoryReplay {
            nodes: vec![readded, fresh],
            links: Vec::new(),
            sources: Vec::new(),
        };

        let births = replay.provisional_births(2).unwrap();
        assert_eq!(births.nodes, vec![NodeKey::from("ISSUE-2")]);
        assert!(replay.provisional_births(3).unwrap().is_empty());
    }

    #[test]
    fn duplicate_version_is_inconsistent() {
        let h = node_history(vec![ChangeRecord::add(1, None), ChangeRecord::add(1, None)]);
        assert!(matches!(
            replay_entity(&h, 1),
            Err(EngineError::InconsistentReplay { .. })
        ));
    }
}
