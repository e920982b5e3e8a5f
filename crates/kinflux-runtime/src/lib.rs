//! Chunked batch-execution runtime for generated chemical-kinetics kernels.
//!
//! A generated kernel evaluates rate/Jacobian equations pointwise over
//! independent conditions. This crate reconciles a fixed per-condition memory
//! footprint against an arbitrarily large condition count: buffers are sized
//! for at most `MaxPerRun` conditions, and an invocation walks the problem in
//! chunks, moving each sub-range through the backend with rectangular strided
//! copies.
//!
//! ```text
//! KernelRuntime::resize() ─► BufferLayout sizes ─► Backend allocates
//! KernelRuntime::invoke() ─► per chunk:
//!     write_rect inputs ─► bind args ─► enqueue + synchronize ─► read_rect outputs
//! ```
//!
//! Backends come from `kinflux-backends`; the runtime never special-cases
//! which one it drives.

pub mod chunk;
pub mod conditions;
pub mod config;
pub mod error;
pub mod kernels;
pub mod layout;
pub mod runtime;
pub mod spec;

pub use chunk::{chunk_count, chunks, Chunk};
pub use conditions::{
    read_initial_conditions, write_initial_conditions, write_output_array, Conditions,
    ConditionsError,
};
pub use config::RuntimeConfig;
pub use error::{Result, RuntimeError};
pub use layout::{BufferLayout, DataOrder, TransferGeometry, ELEM_SIZE};
pub use runtime::{KernelCompiler, KernelRuntime, PrebuiltKernel};
pub use spec::{ArrayDef, ArrayDir, KernelSpec, WorkspaceDef};
