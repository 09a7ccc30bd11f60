use tracegraph_core::{LinkKey, LiveState, NodeKey, SourceKey};
use tracegraph_engine::{Engine, EngineConfig, EngineError, ReconcileReport};
use tracegraph_storage::{GraphStore, SqliteGraphStore};

use crate::flaky::FlakyStore;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// One engine over an in-memory store plus helpers for staging whole states.
pub struct TestGraph<S: GraphStore = SqliteGraphStore> {
    pub engine: Engine<S>,
}

impl TestGraph<SqliteGraphStore> {
    pub fn new() -> Result<Self, EngineError> {
        Ok(Self {
            engine: Engine::open_in_memory()?,
        })
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, EngineError> {
        Ok(Self {
            engine: Engine::with_config(SqliteGraphStore::open_in_memory()?, config),
        })
    }

    /// A file-backed graph living in `dir`.
    pub fn on_disk(dir: &tempfile::TempDir) -> Result<Self, Box<dyn std::error::Error>> {
        let path = dir.path().join("graph.db");
        let path = path.to_str().ok_or("non-utf8 temp path")?;
        Ok(Self {
            engine: Engine::open(path)?,
        })
    }
}

impl TestGraph<FlakyStore<SqliteGraphStore>> {
    pub fn flaky() -> Result<Self, EngineError> {
        let store = FlakyStore::new(SqliteGraphStore::open_in_memory()?);
        Ok(Self {
            engine: Engine::new(store),
        })
    }
}

impl<S: GraphStore> TestGraph<S> {
    pub fn requirement(&mut self, id: &str, data: &[u8]) -> Result<(), EngineError> {
        self.engine.stage_node(id, "Requirement", data)
    }

    pub fn hazard(&mut self, id: &str, data: &[u8]) -> Result<(), EngineError> {
        self.engine.stage_node(id, "Hazard", data)
    }

    /// Stage a small traceability graph: two requirements, one hazard,
    /// two links and two source files.
    pub fn stage_baseline(&mut self) -> Result<(), EngineError> {
        self.requirement("REQ-1", b"shall brake")?;
        self.requirement("REQ-2", b"shall steer")?;
        self.hazard("HAZ-1", b"loss of braking")?;
        self.engine.stage_link("HAZ-1", "MITIGATED_BY", "REQ-1")?;
        self.engine.stage_link("REQ-2", "RELATES_TO", "REQ-1")?;
        self.engine
            .stage_source("com.acme.brake", "Brake.java", "c0ffee", "REQ-1")?;
        self.engine
            .stage_source("com.acme.steer", "Steer.java", "facade", "REQ-2")?;
        Ok(())
    }

    pub fn reconcile_baseline(&mut self) -> Result<ReconcileReport, EngineError> {
        self.stage_baseline()?;
        self.engine.reconcile()
    }

    pub fn live_now(&self) -> Result<LiveState, EngineError> {
        let version = self.engine.version_state()?.working();
        self.engine.live_state_as_of(version)
    }
}

pub fn node_keys(ids: &[&str]) -> Vec<NodeKey> {
    ids.iter().map(|id| NodeKey::from(*id)).collect()
}

pub fn link_key(source: &str, target: &str) -> LinkKey {
    LinkKey {
        source: NodeKey::from(source),
        target: NodeKey::from(target),
    }
}

pub fn source_key(package: &str, file: &str, issue: &str) -> SourceKey {
    SourceKey {
        package: package.to_string(),
        file: file.to_string(),
        issue: NodeKey::from(issue),
    }
}
