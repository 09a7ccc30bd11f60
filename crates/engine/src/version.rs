use tracing::{info, instrument};

use tracegraph_core::{Version, VersionState};
use tracegraph_storage::{GraphStore, GraphWrite};

use crate::error::EngineError;

/// Reads and advances the singleton checkpoint marker.
///
/// Holds no state of its own: every call reads the store, so a reconcile pass
/// reads the version once at entry and threads it through its steps.
pub struct VersionTracker;

impl VersionTracker {
    pub fn current<S: GraphStore>(store: &S) -> Result<VersionState, EngineError> {
        if let Some(version) = store.checkpoint()? {
            return Ok(VersionState::Tagged(version));
        }
        if store.stored_node_count(None)? > 0 {
            Ok(VersionState::Bootstrapped)
        } else {
            Ok(VersionState::Uninitialized)
        }
    }

    /// Confirm the provisional changes at the working version and open the next one.
    #[instrument(skip(store))]
    pub fn tag<S: GraphStore>(store: &mut S) -> Result<Version, EngineError> {
        let state = Self::current(store)?;
        let working = state.working();
        if !state.is_initialized() || store.change_count_at(working)? == 0 {
            return Err(EngineError::EmptyVersion { version: working });
        }

        let next = state.number() + 1;
        store.apply(&[GraphWrite::SetCheckpoint(next)])?;
        info!(version = next, "tagged checkpoint");
        Ok(next)
    }
}
