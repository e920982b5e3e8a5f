//! Backend trait for kernel execution.
//!
//! A backend owns everything device-side: buffers, the loaded program, bound
//! arguments, and the worker pool that executes launches. The orchestrator in
//! `kinflux-runtime` drives it through this trait and never sees backend
//! internals.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   Backend Trait                      │
//! │  - load_program()                                    │
//! │  - allocate()/release() + rect transfers             │
//! │  - set_arg()/enqueue()/synchronize()                 │
//! └──────────────┬──────────────────────┬───────────────┘
//!                ▼                      ▼
//!        ┌──────────────┐      ┌────────────────┐
//!        │ QueueBackend │      │ NativeBackend  │
//!        │ (offload)    │      │ (host direct)  │
//!        └──────────────┘      └────────────────┘
//! ```
//!
//! Every operation is blocking from the caller's perspective; an
//! implementation may pipeline internally as long as result ordering is
//! unaffected.

use std::fmt;

use crate::error::Result;
use crate::program::ProgramSource;
use crate::strided::{CopyRegion, RectOrigin, RectPitch};

/// Handle to a backend-owned buffer.
///
/// Handles are opaque ids; all access goes through Backend methods. A handle
/// is valid from `allocate` until `release` (or `release_all`), after which
/// lookups fail with `InvalidBufferHandle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

impl BufferHandle {
    pub const fn new(id: u64) -> Self {
        BufferHandle(id)
    }

    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buf{}", self.0)
    }
}

/// A positional kernel argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelArg {
    /// A device buffer, passed to the kernel as its base pointer.
    Buffer(BufferHandle),
    /// A 32-bit scalar (the chunk size, in the standard argument list).
    Int(i32),
}

/// Execution backend: command-queue offload device or native host.
pub trait Backend: Send {
    /// Human-readable description of the execution target, for logs.
    fn descriptor(&self) -> String;

    /// Compute units granted to this backend.
    fn compute_units(&self) -> usize;

    /// Whether a program is loaded and launches can be enqueued.
    fn is_ready(&self) -> bool;

    /// Load (or for always-compiled backends, acknowledge) the kernel program.
    fn load_program(&mut self, source: &ProgramSource) -> Result<()>;

    /// Allocate a device buffer of `bytes` bytes, zero-initialized.
    fn allocate(&mut self, bytes: usize) -> Result<BufferHandle>;

    /// Release one buffer. Each handle must be released exactly once;
    /// releasing an unknown handle fails with `InvalidBufferHandle`.
    fn release(&mut self, handle: BufferHandle) -> Result<()>;

    /// Release every live buffer, returning how many were freed. Never fails;
    /// used on teardown paths that must keep going past individual errors.
    fn release_all(&mut self) -> usize;

    /// Blocking rectangular host-to-device transfer. The device-side origin
    /// is always zero: a device buffer holds only the active chunk.
    fn write_rect(
        &mut self,
        dst: BufferHandle,
        host: &[u8],
        host_origin: RectOrigin,
        host_pitch: RectPitch,
        device_pitch: RectPitch,
        region: CopyRegion,
    ) -> Result<()>;

    /// Blocking rectangular device-to-host transfer (symmetric to
    /// [`Backend::write_rect`]).
    fn read_rect(
        &self,
        src: BufferHandle,
        host: &mut [u8],
        host_origin: RectOrigin,
        host_pitch: RectPitch,
        device_pitch: RectPitch,
        region: CopyRegion,
    ) -> Result<()>;

    /// Bind a positional argument for the next enqueue. Bindings persist
    /// across launches until overwritten.
    fn set_arg(&mut self, index: usize, arg: KernelArg) -> Result<()>;

    /// Launch `global_size / local_size` work groups of `local_size` work
    /// items. Blocks until the launch has been submitted; completion is
    /// observed via [`Backend::synchronize`].
    fn enqueue(&mut self, global_size: usize, local_size: usize) -> Result<()>;

    /// Block until all enqueued work has completed.
    fn synchronize(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_handle_display() {
        let handle = BufferHandle::new(42);
        assert_eq!(handle.id(), 42);
        assert_eq!(handle.to_string(), "buf42");
    }
}
