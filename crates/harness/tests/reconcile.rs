use tracegraph_core::{CoreError, NodeKey};
use tracegraph_engine::{EngineConfig, EngineError, ReconcilePhase};
use tracegraph_harness::fixture::{link_key, node_keys, source_key};
use tracegraph_harness::{TestGraph, TestResult};
use tracegraph_storage::GraphStore;

// ============================================================================
// Nodes
// ============================================================================

#[test]
fn modified_and_added_nodes_are_reported() -> TestResult {
    let mut g = TestGraph::new()?;
    g.requirement("ISSUE-1", b"v1")?;
    g.engine.reconcile()?;
    g.engine.tag()?;

    g.requirement("ISSUE-1", b"v2")?;
    g.hazard("ISSUE-2", b"x")?;
    let report = g.engine.reconcile()?;

    assert_eq!(report.nodes.added, node_keys(&["ISSUE-2"]));
    assert_eq!(report.nodes.modified, node_keys(&["ISSUE-1"]));
    assert!(report.nodes.removed.is_empty());

    let live = g.engine.live_state_as_of(g.engine.current_version()?)?;
    assert_eq!(live.nodes.len(), 2);
    assert_eq!(live.node("ISSUE-1").map(|n| n.data.clone()), Some(b"v2".to_vec()));

    // The earlier version still sees the old content.
    let before = g.engine.live_state_as_of(0)?;
    assert_eq!(before.nodes.len(), 1);
    assert_eq!(before.node("ISSUE-1").map(|n| n.data.clone()), Some(b"v1".to_vec()));
    Ok(())
}

#[test]
fn modification_does_not_touch_stored_payload() -> TestResult {
    let mut g = TestGraph::new()?;
    g.requirement("ISSUE-1", b"v1")?;
    g.engine.reconcile()?;
    g.engine.tag()?;
    g.requirement("ISSUE-1", b"v2")?;
    g.engine.reconcile()?;

    let history = g.engine.store().node_history()?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].entity.data, b"v1".to_vec());
    assert_eq!(history[0].changes.len(), 2);
    Ok(())
}

#[test]
fn removed_nodes_are_marked_not_deleted() -> TestResult {
    let mut g = TestGraph::new()?;
    g.reconcile_baseline()?;
    g.engine.tag()?;

    g.requirement("REQ-1", b"shall brake")?;
    g.requirement("REQ-2", b"shall steer")?;
    g.engine.stage_link("REQ-2", "RELATES_TO", "REQ-1")?;
    g.engine.stage_source("com.acme.brake", "Brake.java", "c0ffee", "REQ-1")?;
    g.engine.stage_source("com.acme.steer", "Steer.java", "facade", "REQ-2")?;
    let report = g.engine.reconcile()?;

    assert_eq!(report.nodes.removed, node_keys(&["HAZ-1"]));
    assert_eq!(report.links.removed, vec![link_key("HAZ-1", "REQ-1")]);
    assert_eq!(g.engine.node_count(Some("Hazard"))?, 0);
    assert_eq!(g.engine.store().stored_node_count(Some("Hazard"))?, 1);
    assert_eq!(g.engine.link_count(None)?, 1);
    assert_eq!(g.engine.store().stored_link_count(None)?, 2);
    Ok(())
}

#[test]
fn type_index_is_ensured_once_per_type() -> TestResult {
    let mut g = TestGraph::new()?;
    g.reconcile_baseline()?;
    assert_eq!(g.engine.store().indexed_types()?, vec!["Hazard", "Requirement"]);
    Ok(())
}

#[test]
fn reserved_types_cannot_be_staged() -> TestResult {
    let mut g = TestGraph::new()?;
    let result = g.engine.stage_node("PKG-1", "Package", b"");
    assert!(matches!(
        result,
        Err(EngineError::Core(CoreError::ReservedNodeType(_)))
    ));
    assert!(g.engine.staging().is_empty());
    Ok(())
}

// ============================================================================
// Links
// ============================================================================

#[test]
fn changed_link_kind_is_not_a_modification() -> TestResult {
    let mut g = TestGraph::new()?;
    g.requirement("A", b"")?;
    g.requirement("B", b"")?;
    g.engine.stage_link("A", "TRACES", "B")?;
    g.engine.reconcile()?;
    g.engine.tag()?;

    g.requirement("A", b"")?;
    g.requirement("B", b"")?;
    g.engine.stage_link("A", "MITIGATES", "B")?;
    let report = g.engine.reconcile()?;

    assert!(report.is_empty());
    assert_eq!(report.logged.total(), 0);
    assert_eq!(g.engine.link_count(Some("TRACES"))?, 1);
    assert_eq!(g.engine.link_count(Some("MITIGATES"))?, 0);
    Ok(())
}

#[test]
fn dangling_link_fails_and_keeps_staging() -> TestResult {
    let mut g = TestGraph::new()?;
    g.requirement("A", b"")?;
    g.engine.stage_link("A", "TRACES", "GHOST")?;

    let result = g.engine.reconcile();
    assert!(matches!(result, Err(EngineError::DanglingLink { .. })));
    assert_eq!(g.engine.phase(), ReconcilePhase::Failed);
    assert_eq!(g.engine.staging().links().len(), 1);
    assert_eq!(g.engine.current_version()?, -1);
    Ok(())
}

#[test]
fn lenient_engine_drops_dangling_entries() -> TestResult {
    let mut g = TestGraph::with_config(EngineConfig {
        strict_references: false,
        ..EngineConfig::default()
    })?;
    assert!(!g.engine.config().strict_references);
    g.requirement("A", b"")?;
    g.engine.stage_link("A", "TRACES", "GHOST")?;
    g.engine.stage_source("com.foo", "Bar.java", "abc", "GHOST")?;

    let report = g.engine.reconcile()?;
    assert_eq!(report.nodes.added, node_keys(&["A"]));
    assert!(report.links.added.is_empty());
    assert!(report.sources.added.is_empty());
    assert_eq!(g.engine.phase(), ReconcilePhase::Idle);
    Ok(())
}

// ============================================================================
// Sources
// ============================================================================

#[test]
fn omitted_source_is_removed_but_kept_in_history() -> TestResult {
    let mut g = TestGraph::new()?;
    g.requirement("ISSUE-1", b"v1")?;
    g.engine.stage_source("com.foo", "Bar.java", "abc123", "ISSUE-1")?;
    g.engine.reconcile()?;
    let prior = g.engine.current_version()?;
    let new = g.engine.tag()?;

    g.requirement("ISSUE-1", b"v1")?;
    let report = g.engine.reconcile()?;
    let key = source_key("com.foo", "Bar.java", "ISSUE-1");
    assert_eq!(report.sources.removed, vec![key.clone()]);

    assert!(!g.engine.live_state_as_of(new)?.sources.contains_key(&key));
    assert!(g.engine.live_state_as_of(prior)?.sources.contains_key(&key));
    Ok(())
}

#[test]
fn commit_change_is_a_modification() -> TestResult {
    let mut g = TestGraph::new()?;
    g.reconcile_baseline()?;
    let v1 = g.engine.tag()?;

    g.stage_baseline()?;
    g.engine
        .stage_source("com.acme.brake", "Brake.java", "beef42", "REQ-1")?;
    let report = g.engine.reconcile()?;

    let key = source_key("com.acme.brake", "Brake.java", "REQ-1");
    assert_eq!(report.sources.modified, vec![key.clone()]);
    assert!(report.sources.added.is_empty());
    assert_eq!(g.engine.live_state_as_of(v1)?.sources[&key].commit, "beef42");
    assert_eq!(g.engine.live_state_as_of(v1 - 1)?.sources[&key].commit, "c0ffee");

    // Replaying the new commit makes a second pass a no-op.
    g.stage_baseline()?;
    g.engine
        .stage_source("com.acme.brake", "Brake.java", "beef42", "REQ-1")?;
    assert!(g.engine.reconcile()?.is_empty());
    Ok(())
}

#[test]
fn source_chain_counts() -> TestResult {
    let mut g = TestGraph::new()?;
    g.stage_baseline()?;
    g.engine
        .stage_source("com.acme.brake", "Pedal.java", "c0ffee", "REQ-1")?;
    g.engine.reconcile()?;

    assert_eq!(g.engine.node_count(Some("Package"))?, 2);
    assert_eq!(g.engine.node_count(Some("Code"))?, 3);
    assert_eq!(g.engine.link_count(Some("IMPLEMENTS"))?, 2);
    assert_eq!(g.engine.link_count(Some("CONTAINED_BY"))?, 3);
    assert_eq!(g.engine.node_count(None)?, 3);
    assert_eq!(g.engine.node_count(Some("Requirement"))?, 2);
    assert_eq!(g.engine.store().stored_node_count(Some("Package"))?, 2);
    Ok(())
}

#[test]
fn empty_pass_on_empty_store_changes_nothing() -> TestResult {
    let mut g = TestGraph::new()?;
    let report = g.engine.reconcile()?;
    assert!(report.is_empty());
    assert_eq!(report.version, 0);
    assert_eq!(g.engine.current_version()?, -1);
    assert!(g.live_now()?.is_empty());
    assert_eq!(g.engine.pass_history()?.len(), 1);
    Ok(())
}

#[test]
fn reconcile_clears_staging_on_success() -> TestResult {
    let mut g = TestGraph::new()?;
    g.stage_baseline()?;
    assert!(!g.engine.staging().is_empty());
    let report = g.engine.reconcile()?;
    assert!(g.engine.staging().is_empty());
    assert_eq!(report.counts().added, 7);
    assert_eq!(report.logged.added, 7);
    assert_eq!(
        g.live_now()?.nodes.keys().cloned().collect::<Vec<_>>(),
        vec![
            NodeKey::from("HAZ-1"),
            NodeKey::from("REQ-1"),
            NodeKey::from("REQ-2")
        ]
    );
    Ok(())
}
