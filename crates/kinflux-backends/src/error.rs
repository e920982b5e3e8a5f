//! Error types for backend operations

use std::path::PathBuf;

use crate::device::DeviceKind;

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors that can occur during device selection, program loading, buffer
/// management, and kernel execution.
///
/// All of these are fatal to the current operation and are surfaced to the
/// caller immediately; nothing is retried internally.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// No enumerated device descriptor matched the platform hint
    #[error("no device matching '{hint}' on this host")]
    DeviceNotFound { hint: String },

    /// Zero devices of the requested kind were enumerated
    #[error("no devices of kind '{kind}' are available")]
    NoDevicesOfKind { kind: DeviceKind },

    /// A CPU sub-device partition asked for more compute units than exist
    #[error("requested {requested} compute units, device reports at most {available}")]
    TooManyUnitsRequested { requested: usize, available: usize },

    /// The kernel binary path does not exist
    #[error("kernel binary not found: {}", path.display())]
    BinaryNotFound { path: PathBuf },

    /// The kernel binary exists but could not be read in full
    #[error("failed to read kernel binary {}: {reason}", path.display())]
    BinaryReadError { path: PathBuf, reason: String },

    /// Loading or linking the kernel against the selected device failed.
    /// Carries the loader's diagnostic text verbatim.
    #[error("kernel build failed:\n{log}")]
    BuildFailure { log: String },

    /// Device buffer allocation failed
    #[error("allocation of {requested} bytes failed: {reason}")]
    AllocationFailure { requested: usize, reason: String },

    /// A host<->device transfer failed
    #[error("transfer failed: {0}")]
    TransferFailure(String),

    /// The buffer handle does not name a live allocation
    #[error("invalid buffer handle: {0}")]
    InvalidBufferHandle(u64),

    /// Enqueue was attempted with a positional argument slot left unbound
    #[error("kernel argument {0} is not bound")]
    UnboundArg(usize),

    /// Enqueue was attempted before a program was loaded
    #[error("no kernel program loaded")]
    ProgramNotLoaded,

    /// Global/local work sizes do not describe a valid launch
    #[error("invalid launch: {0}")]
    InvalidLaunch(String),

    /// The kernel entry point reported a non-success status
    #[error("kernel execution failed with status {0}")]
    KernelFailure(i32),

    /// Creating the command queue's worker pool failed
    #[error("failed to create command queue: {0}")]
    QueueCreation(String),
}
