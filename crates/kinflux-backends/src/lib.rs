//! Execution backends for the kinflux kernel runtime.
//!
//! This crate provides:
//! - **Backend trait**: the capability surface the orchestrator drives
//! - **QueueBackend**: the command-queue offload device
//! - **NativeBackend**: direct host execution (the degenerate backend)
//! - **StridedCopy**: the rectangular transfer primitive both backends share
//! - **Device selection**: enumeration, hint matching, CPU sub-device
//!   partitioning
//! - **Program loading**: kernel cdylibs via `libloading`, plus an
//!   in-process registry for kernels compiled into the binary
//!
//! # Architecture
//!
//! ```text
//! KernelRuntime (kinflux-runtime)
//!         │ drives
//!         ▼
//! ┌───────────────────────────────────────────┐
//! │               Backend trait                │
//! │ load_program / allocate / write_rect /     │
//! │ read_rect / set_arg / enqueue / sync       │
//! └────────────┬───────────────┬──────────────┘
//!              ▼               ▼
//!        QueueBackend    NativeBackend
//!        (offload queue) (host threads)
//! ```
//!
//! Both backends execute the same ABI entry point (`kinflux-kernel-abi`);
//! they differ in construction, device selection, and where the program
//! comes from.

mod arena;
mod exec;

pub mod backend;
pub mod device;
pub mod error;
pub mod program;
pub mod registry;
pub mod strided;

mod native;
mod queue;

pub use backend::{Backend, BufferHandle, KernelArg};
pub use device::{enumerate, select_device, DeviceInfo, DeviceKind, DeviceQuery, SelectedDevice};
pub use error::{BackendError, Result};
pub use native::NativeBackend;
pub use program::{Program, ProgramSource};
pub use queue::QueueBackend;
pub use registry::{lookup_kernel, register_kernel, registered_kernels};
pub use strided::{copy_rect, CopyRegion, RectOrigin, RectPitch};
