use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Dimension mismatch: index holds {expected}-d vectors, got {got}-d")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Length mismatch: {vectors} vectors but {metadatas} metadata records")]
    LengthMismatch { vectors: usize, metadatas: usize },

    #[error("Index is empty, nothing to persist")]
    EmptyIndex,

    #[error("Corrupt store artifact {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    /// True for the "store was never built" condition callers are expected to handle.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
