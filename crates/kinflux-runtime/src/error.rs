//! Error types for the kernel runtime

use kinflux_backends::BackendError;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors surfaced by the orchestrator.
///
/// Backend failures pass through unchanged; the variants here cover the
/// runtime's own lifecycle and argument validation.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// `invoke` was called before any successful `resize`
    #[error("runtime is not initialized: call resize() before invoke()")]
    NotInitialized,

    /// The runtime was finalized; only destruction may follow
    #[error("runtime has been finalized")]
    Finalized,

    /// A host array's length does not match the array table
    #[error("array '{name}' has {actual} elements, expected {expected}")]
    ArraySizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// The number of host arrays does not match the array table
    #[error("wrong number of {dir} arrays: got {actual}, kernel takes {expected}")]
    ArrayCountMismatch {
        dir: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A device-side failure (selection, loading, allocation, transfer,
    /// execution)
    #[error(transparent)]
    Backend(#[from] BackendError),
}
