use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid entity: {0}")]
    InvalidEntity(String),

    #[error("node type {0:?} is reserved for source-tree entities")]
    ReservedNodeType(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}
