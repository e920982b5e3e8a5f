//! The kernel runtime orchestrator.
//!
//! Owns the lifecycle of one kernel on one backend: compile, size buffers,
//! drive chunked transfer-execute-transfer cycles, tear down. Control flow is
//! single-threaded; all parallelism happens inside `enqueue`.
//!
//! ```text
//! Uninitialized ──compile()──► Compiled ──resize()──► Initialized
//!       │                        ▲  │                    │  ▲
//!       └──resize(skip_compile)──┘  └────── resize() ────┘  │ (repeat)
//!                                                           ▼
//!                                                       Finalized
//! ```
//!
//! A resize with unchanged dimensions is a no-op; a changed one frees and
//! reallocates. Teardown always releases buffers before backend resources,
//! on every exit route including drop-after-error.

use std::time::Instant;

use kinflux_backends::{Backend, BackendError, BufferHandle, KernelArg};

use crate::chunk::{chunk_count, chunks};
use crate::config::RuntimeConfig;
use crate::error::{Result, RuntimeError};
use crate::layout::BufferLayout;
use crate::spec::{ArrayDir, KernelSpec};

/// The external build step, exposed to the runtime as a capability.
///
/// `compile()` invokes this before asking the backend to load the program;
/// the implementation must leave the artifact where the kernel spec's program
/// source points.
pub trait KernelCompiler: Send {
    fn compile(
        &self,
        spec: &KernelSpec,
        config: &RuntimeConfig,
    ) -> std::result::Result<(), BackendError>;
}

/// Capability for kernels that need no build step: prebuilt binaries and
/// registered in-process kernels.
pub struct PrebuiltKernel;

impl KernelCompiler for PrebuiltKernel {
    fn compile(
        &self,
        _spec: &KernelSpec,
        _config: &RuntimeConfig,
    ) -> std::result::Result<(), BackendError> {
        Ok(())
    }
}

/// Device allocations for one (problem_size, work_size) configuration.
#[derive(Debug, Clone)]
struct DeviceBuffers {
    problem_size: usize,
    work_size: usize,
    max_per_run: usize,
    /// One buffer per named array, parallel to the spec's array table.
    arrays: Vec<BufferHandle>,
    /// The packed workspace scratch buffer, when the kernel uses one.
    workspace: Option<BufferHandle>,
}

/// Largest chunk the memory ceiling admits, floored to the vector width.
/// Zero means not even one padded condition fits.
pub(crate) fn conditions_that_fit(
    mem_limit_bytes: usize,
    per_condition_bytes: usize,
    layout: &BufferLayout,
) -> usize {
    let fit = mem_limit_bytes / per_condition_bytes.max(1);
    layout.floor_to_width(fit)
}

/// Orchestrator for one kernel on one backend.
pub struct KernelRuntime {
    config: RuntimeConfig,
    spec: KernelSpec,
    /// `None` once finalized; teardown drops program, queue, and device
    /// resources in that order.
    backend: Option<Box<dyn Backend>>,
    compiler: Box<dyn KernelCompiler>,
    compiled: bool,
    buffers: Option<DeviceBuffers>,
    compile_seconds: f64,
    setup_seconds: f64,
    run_seconds: f64,
}

impl KernelRuntime {
    /// Construct an uninitialized runtime over a prebuilt kernel.
    pub fn new(config: RuntimeConfig, spec: KernelSpec, backend: Box<dyn Backend>) -> Self {
        Self::with_compiler(config, spec, backend, Box::new(PrebuiltKernel))
    }

    /// Construct with an explicit compile capability.
    pub fn with_compiler(
        config: RuntimeConfig,
        spec: KernelSpec,
        backend: Box<dyn Backend>,
        compiler: Box<dyn KernelCompiler>,
    ) -> Self {
        // always-compiled backends (native host) start out ready
        let compiled = backend.is_ready();
        Self {
            config,
            spec,
            backend: Some(backend),
            compiler,
            compiled,
            buffers: None,
            compile_seconds: 0.0,
            setup_seconds: 0.0,
            run_seconds: 0.0,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn spec(&self) -> &KernelSpec {
        &self.spec
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    pub fn is_initialized(&self) -> bool {
        self.buffers.is_some()
    }

    /// Chunk capacity of the current allocation.
    pub fn max_per_run(&self) -> Option<usize> {
        self.buffers.as_ref().map(|b| b.max_per_run)
    }

    /// Ids of the live device buffers (arrays, then workspace). Stable across
    /// no-op resizes; empty when uninitialized.
    pub fn buffer_ids(&self) -> Vec<u64> {
        match &self.buffers {
            Some(b) => b
                .arrays
                .iter()
                .map(|h| h.id())
                .chain(b.workspace.iter().map(|h| h.id()))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn compile_seconds(&self) -> f64 {
        self.compile_seconds
    }

    pub fn setup_seconds(&self) -> f64 {
        self.setup_seconds
    }

    pub fn run_seconds(&self) -> f64 {
        self.run_seconds
    }

    /// Invoke the build capability and load the program. Idempotent; safe to
    /// call any number of times.
    pub fn compile(&mut self) -> Result<()> {
        if self.backend.is_none() {
            return Err(RuntimeError::Finalized);
        }
        if self.compiled {
            return Ok(());
        }

        let start = Instant::now();
        self.compiler.compile(&self.spec, &self.config)?;
        let source = self.spec.source.clone();
        self.backend
            .as_deref_mut()
            .ok_or(RuntimeError::Finalized)?
            .load_program(&source)?;
        self.compiled = true;
        self.compile_seconds += start.elapsed().as_secs_f64();

        tracing::info!(kernel = %self.spec.name, "kernel_compiled");
        Ok(())
    }

    /// Allocate (or re-allocate) device buffers for `problem_size` conditions
    /// at `work_size` parallel units.
    ///
    /// With `skip_compile`, a never-compiled runtime trusts the caller that a
    /// compiled artifact already exists at the configured path and loads it
    /// without invoking the build capability.
    ///
    /// A call with both dimensions unchanged is a no-op that keeps the
    /// existing buffers; a changed call frees and reallocates.
    pub fn resize(&mut self, problem_size: usize, work_size: usize, skip_compile: bool) -> Result<()> {
        if self.backend.is_none() {
            return Err(RuntimeError::Finalized);
        }

        if !self.compiled {
            if skip_compile {
                let source = self.spec.source.clone();
                self.backend
                    .as_deref_mut()
                    .ok_or(RuntimeError::Finalized)?
                    .load_program(&source)?;
                self.compiled = true;
                tracing::debug!(kernel = %self.spec.name, "compile_skipped_trusting_prebuilt");
            } else {
                self.compile()?;
            }
        }

        if let Some(existing) = &self.buffers {
            if existing.problem_size == problem_size && existing.work_size == work_size {
                tracing::debug!(problem_size, work_size, "resize_noop");
                return Ok(());
            }
        }
        self.finalize_memory();

        let start = Instant::now();
        let layout = self.config.layout();
        let per_condition = self.spec.per_condition_bytes();
        let fit = conditions_that_fit(self.config.mem_limit_bytes, per_condition, &layout);
        if fit == 0 {
            return Err(RuntimeError::Backend(BackendError::AllocationFailure {
                requested: layout.padded(1) * per_condition,
                reason: format!(
                    "memory ceiling of {} bytes cannot hold one vector-padded condition",
                    self.config.mem_limit_bytes
                ),
            }));
        }
        let max_per_run = fit.min(problem_size).max(1);

        let spec = &self.spec;
        let backend = self.backend.as_deref_mut().ok_or(RuntimeError::Finalized)?;

        let mut arrays = Vec::with_capacity(spec.arrays.len());
        let mut failed: Option<BackendError> = None;
        for array in &spec.arrays {
            match backend.allocate(layout.array_bytes(array.per_item, max_per_run)) {
                Ok(handle) => arrays.push(handle),
                Err(err) => {
                    failed = Some(err);
                    break;
                }
            }
        }
        let workspace = if failed.is_none() && !spec.workspace.is_empty() {
            let (_, total) = layout.pack_offsets(&spec.workspace_per_item(), max_per_run);
            match backend.allocate(total) {
                Ok(handle) => Some(handle),
                Err(err) => {
                    failed = Some(err);
                    None
                }
            }
        } else {
            None
        };
        if let Some(err) = failed {
            // a failed resize must not leak the buffers that did allocate
            backend.release_all();
            return Err(err.into());
        }

        self.buffers = Some(DeviceBuffers {
            problem_size,
            work_size,
            max_per_run,
            arrays,
            workspace,
        });
        self.setup_seconds += start.elapsed().as_secs_f64();

        tracing::info!(
            problem_size,
            work_size,
            max_per_run,
            num_chunks = chunk_count(problem_size, max_per_run),
            "runtime_resized"
        );
        Ok(())
    }

    /// Run the kernel over every condition.
    ///
    /// `inputs` and `outputs` are host arrays matching the spec's input and
    /// output tables, each holding `per_item * problem_size` f64 values in
    /// the configured order. Chunks execute strictly sequentially: chunk
    /// *i*'s results are in the host arrays before chunk *i+1* transfers in.
    pub fn invoke(&mut self, inputs: &[&[f64]], outputs: &mut [&mut [f64]]) -> Result<()> {
        if self.backend.is_none() {
            return Err(RuntimeError::Finalized);
        }
        let buffers = self.buffers.clone().ok_or(RuntimeError::NotInitialized)?;

        if inputs.len() != self.spec.input_count() {
            return Err(RuntimeError::ArrayCountMismatch {
                dir: "input",
                expected: self.spec.input_count(),
                actual: inputs.len(),
            });
        }
        if outputs.len() != self.spec.output_count() {
            return Err(RuntimeError::ArrayCountMismatch {
                dir: "output",
                expected: self.spec.output_count(),
                actual: outputs.len(),
            });
        }
        for ((_, def), host) in self.spec.inputs().zip(inputs.iter()) {
            if host.len() != def.per_item * buffers.problem_size {
                return Err(RuntimeError::ArraySizeMismatch {
                    name: def.name.clone(),
                    expected: def.per_item * buffers.problem_size,
                    actual: host.len(),
                });
            }
        }
        for ((_, def), host) in self.spec.outputs().zip(outputs.iter()) {
            if host.len() != def.per_item * buffers.problem_size {
                return Err(RuntimeError::ArraySizeMismatch {
                    name: def.name.clone(),
                    expected: def.per_item * buffers.problem_size,
                    actual: host.len(),
                });
            }
        }

        if buffers.problem_size == 0 {
            // zero chunks: no transfers, no launches
            return Ok(());
        }

        let start = Instant::now();
        let layout = self.config.layout();
        let local_size = layout.vec_width();
        let global_size = buffers.work_size.max(1) * local_size;

        let spec = &self.spec;
        let backend = self.backend.as_deref_mut().ok_or(RuntimeError::Finalized)?;

        for chunk in chunks(buffers.problem_size, buffers.max_per_run) {
            debug_assert!(chunk.this_run > 0);

            let mut input_idx = 0;
            for (slot, def) in spec.arrays.iter().enumerate() {
                if def.dir != ArrayDir::Input {
                    continue;
                }
                let g = layout.transfer_geometry(
                    def.per_item,
                    buffers.problem_size,
                    chunk.offset,
                    chunk.this_run,
                );
                backend.write_rect(
                    buffers.arrays[slot],
                    bytemuck::cast_slice(inputs[input_idx]),
                    g.host_origin,
                    g.host_pitch,
                    g.device_pitch,
                    g.region,
                )?;
                input_idx += 1;
            }

            // chunk size, then the arrays in table order, then workspace
            backend.set_arg(0, KernelArg::Int(chunk.this_run as i32))?;
            for (slot, handle) in buffers.arrays.iter().enumerate() {
                backend.set_arg(slot + 1, KernelArg::Buffer(*handle))?;
            }
            if let Some(workspace) = buffers.workspace {
                backend.set_arg(buffers.arrays.len() + 1, KernelArg::Buffer(workspace))?;
            }

            backend.enqueue(global_size, local_size)?;
            backend.synchronize()?;

            let mut output_idx = 0;
            for (slot, def) in spec.arrays.iter().enumerate() {
                if def.dir != ArrayDir::Output {
                    continue;
                }
                let g = layout.transfer_geometry(
                    def.per_item,
                    buffers.problem_size,
                    chunk.offset,
                    chunk.this_run,
                );
                backend.read_rect(
                    buffers.arrays[slot],
                    bytemuck::cast_slice_mut(&mut *outputs[output_idx]),
                    g.host_origin,
                    g.host_pitch,
                    g.device_pitch,
                    g.region,
                )?;
                output_idx += 1;
            }

            tracing::trace!(
                offset = chunk.offset,
                this_run = chunk.this_run,
                "chunk_complete"
            );
        }

        self.run_seconds += start.elapsed().as_secs_f64();
        Ok(())
    }

    /// Release device buffers. Safe on an already-finalized or
    /// never-initialized runtime.
    pub fn finalize_memory(&mut self) {
        if self.buffers.take().is_some() {
            if let Some(backend) = self.backend.as_deref_mut() {
                let released = backend.release_all();
                tracing::debug!(released, "device_buffers_released");
            }
        }
    }

    /// Release buffers, then program/queue/device resources, in that order.
    /// Safe to call repeatedly; the runtime is terminal afterwards.
    pub fn finalize(&mut self) {
        self.finalize_memory();
        if let Some(backend) = self.backend.take() {
            tracing::debug!(device = %backend.descriptor(), "backend_finalized");
            drop(backend);
        }
    }
}

impl Drop for KernelRuntime {
    fn drop(&mut self) {
        // teardown must run on every exit route, including drop-after-error
        self.finalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::DataOrder;
    use crate::spec::ArrayDef;
    use kinflux_backends::{
        register_kernel, DeviceKind, DeviceQuery, ProgramSource, QueueBackend,
    };
    use kinflux_kernel_abi::CKernelLaunch;

    unsafe extern "C" fn nop_entry(
        _launch: *const CKernelLaunch,
        _params: *const u8,
        _params_len: usize,
    ) -> i32 {
        0
    }

    fn nop_runtime(mem_limit: usize, vec_width: usize) -> KernelRuntime {
        register_kernel("runtime_test_nop", nop_entry);
        let config = RuntimeConfig {
            mem_limit_bytes: mem_limit,
            vec_width,
            ..RuntimeConfig::default()
        };
        let spec = KernelSpec::new(
            "runtime_test_nop",
            ProgramSource::Registered("runtime_test_nop".into()),
        )
        .with_array(ArrayDef::input("phi", 2))
        .with_array(ArrayDef::output("dphi", 2));
        let backend = QueueBackend::new(&DeviceQuery::new(DeviceKind::Accelerator, 1)).unwrap();
        KernelRuntime::new(config, spec, Box::new(backend))
    }

    #[test]
    fn fit_is_floored_to_vector_width() {
        let layout = BufferLayout::new(DataOrder::RowMajor, 4);
        // 10 conditions fit; floored to 8
        assert_eq!(conditions_that_fit(10 * 16, 16, &layout), 8);
        // fewer than one vector's worth is zero
        assert_eq!(conditions_that_fit(3 * 16, 16, &layout), 0);

        let unvectorized = BufferLayout::new(DataOrder::RowMajor, 1);
        assert_eq!(conditions_that_fit(10 * 16, 16, &unvectorized), 10);
    }

    #[test]
    fn invoke_before_resize_is_not_initialized() {
        let mut runtime = nop_runtime(1 << 20, 1);
        let err = runtime.invoke(&[], &mut []).unwrap_err();
        assert!(matches!(err, RuntimeError::NotInitialized));
    }

    #[test]
    fn compile_is_idempotent() {
        let mut runtime = nop_runtime(1 << 20, 1);
        assert!(!runtime.is_compiled());
        runtime.compile().unwrap();
        assert!(runtime.is_compiled());
        runtime.compile().unwrap();
    }

    #[test]
    fn resize_noop_keeps_buffer_identities() {
        let mut runtime = nop_runtime(1 << 20, 1);
        runtime.resize(100, 2, false).unwrap();
        let first = runtime.buffer_ids();
        assert!(!first.is_empty());

        runtime.resize(100, 2, false).unwrap();
        assert_eq!(runtime.buffer_ids(), first);

        // a changed dimension reallocates
        runtime.resize(200, 2, false).unwrap();
        assert_ne!(runtime.buffer_ids(), first);
    }

    #[test]
    fn max_per_run_is_clamped_by_problem_size() {
        let mut runtime = nop_runtime(1 << 20, 1);
        runtime.resize(10, 1, false).unwrap();
        assert_eq!(runtime.max_per_run(), Some(10));
    }

    #[test]
    fn max_per_run_is_bounded_by_memory_ceiling() {
        // 4 f64 per condition = 32 bytes; ceiling of 160 bytes fits 5
        let mut runtime = nop_runtime(160, 1);
        runtime.resize(100, 1, false).unwrap();
        assert_eq!(runtime.max_per_run(), Some(5));
    }

    #[test]
    fn too_small_ceiling_is_allocation_failure() {
        let mut runtime = nop_runtime(8, 1);
        let err = runtime.resize(10, 1, false).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Backend(BackendError::AllocationFailure { .. })
        ));
    }

    #[test]
    fn skip_compile_trusts_prebuilt_program() {
        let mut runtime = nop_runtime(1 << 20, 1);
        runtime.resize(4, 1, true).unwrap();
        assert!(runtime.is_compiled());
    }

    #[test]
    fn finalize_is_safe_and_terminal() {
        let mut runtime = nop_runtime(1 << 20, 1);
        runtime.resize(4, 1, false).unwrap();
        runtime.finalize_memory();
        runtime.finalize_memory();
        runtime.finalize();
        runtime.finalize();
        assert!(matches!(
            runtime.resize(4, 1, false),
            Err(RuntimeError::Finalized)
        ));
    }
}
