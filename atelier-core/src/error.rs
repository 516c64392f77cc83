//! Error types for canvas operations.

use thiserror::Error;

/// Result type for canvas operations.
pub type CanvasResult<T> = Result<T, CanvasError>;

/// Errors that can occur in canvas operations.
///
/// Interactive paths (reorder, transform, hit-test) never return these;
/// they degrade to an unchanged state instead. Errors are reserved for
/// structural calls such as project load.
#[derive(Debug, Error)]
pub enum CanvasError {
    /// Layer not found in the ordering store.
    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    /// Item not found in any layer.
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// An ID appears more than once in a snapshot.
    #[error("Duplicate id in snapshot: {0}")]
    DuplicateId(String),

    /// Invalid store operation.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Snapshot serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
