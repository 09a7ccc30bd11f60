use thiserror::Error;
use tracegraph_core::{CoreError, EntityKind, Version};
use tracegraph_storage::StorageError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("nothing to tag at version {version}")]
    EmptyVersion { version: Version },

    #[error("inconsistent history for {} {key}: {reason}", .kind.as_str())]
    InconsistentReplay {
        kind: EntityKind,
        key: String,
        reason: String,
    },

    #[error("link {source_id} -> {target_id} references a node that is not staged")]
    DanglingLink { source_id: String, target_id: String },

    #[error("source {package}/{file} references issue {issue} that is not staged")]
    DanglingSource {
        package: String,
        file: String,
        issue: String,
    },
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Unavailable(msg) => Self::StoreUnavailable(msg),
            other => Self::Storage(other),
        }
    }
}
