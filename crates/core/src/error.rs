//! Error types for index construction, querying, and persistence.

use thiserror::Error;

/// Errors surfaced by [`HnswIndex`](crate::HnswIndex).
///
/// An empty index is not an error: searching a built index with no nodes
/// returns an empty result.
#[derive(Debug, Error)]
pub enum HnswError {
    /// Invalid or inconsistent parameters, or an operation issued in the wrong
    /// phase (adding after build, searching before build, `ef_search < k`).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A vector's length does not match the index dimension. Only the offending
    /// vector or query is rejected.
    #[error("dimension mismatch: index has {expected} dimensions, vector has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The external id was already added to this index.
    #[error("duplicate vector id {0}")]
    DuplicateId(u64),

    /// The external id is not present in this index.
    #[error("unknown vector id {0}")]
    UnknownId(u64),

    /// The worker pool for a parallel build or batch search could not start.
    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Filesystem error while saving or loading a model.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The model could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A loaded model failed integrity or structural validation.
    #[error("corrupt model: {0}")]
    Corrupt(String),
}

impl HnswError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        HnswError::Configuration(msg.into())
    }
}

impl From<bincode::Error> for HnswError {
    fn from(e: bincode::Error) -> Self {
        HnswError::Serialization(e.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HnswError>;
