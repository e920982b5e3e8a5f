//! Native host backend.
//!
//! The degenerate case of the backend capability: the kernel is linked into
//! (or loaded by) the process itself, so there is no separate compile step —
//! the backend is ready the moment it is constructed. `enqueue` is a direct
//! call into the generated routine, with the requested work size applied as a
//! thread-count side effect on the backend's own pool.
//!
//! Buffers still exist (the orchestrator's chunk structure is
//! backend-agnostic); here they are plain host allocations and transfers are
//! host memcpys.

use crate::arena::BufferArena;
use crate::backend::{Backend, BufferHandle, KernelArg};
use crate::error::{BackendError, Result};
use crate::exec::{launch_groups, marshal_args, validate_launch};
use crate::program::{Program, ProgramSource};
use crate::strided::{CopyRegion, RectOrigin, RectPitch};

/// Direct host-execution backend.
#[derive(Debug)]
pub struct NativeBackend {
    work_size: usize,
    pool: rayon::ThreadPool,
    memory: BufferArena,
    program: Program,
    args: Vec<Option<KernelArg>>,
}

impl NativeBackend {
    /// Resolve the kernel and build a worker pool of `work_size` threads.
    ///
    /// Fails with `TooManyUnitsRequested` when `work_size` exceeds the
    /// host's reported parallelism.
    pub fn new(work_size: usize, source: &ProgramSource) -> Result<Self> {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let requested = work_size.max(1);
        if requested > available {
            return Err(BackendError::TooManyUnitsRequested {
                requested,
                available,
            });
        }

        let program = Program::load(source)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(requested)
            .thread_name(|i| format!("kinflux-native-{i}"))
            .build()
            .map_err(|err| BackendError::QueueCreation(err.to_string()))?;

        tracing::debug!(
            kernel = program.name(),
            threads = requested,
            "native_backend_created"
        );

        Ok(Self {
            work_size: requested,
            pool,
            memory: BufferArena::new(),
            program,
            args: Vec::new(),
        })
    }
}

impl Backend for NativeBackend {
    fn descriptor(&self) -> String {
        format!("native host [{} threads]", self.work_size)
    }

    fn compute_units(&self) -> usize {
        self.work_size
    }

    fn is_ready(&self) -> bool {
        // host kernels are linked in; there is nothing to compile
        true
    }

    fn load_program(&mut self, _source: &ProgramSource) -> Result<()> {
        tracing::debug!(kernel = self.program.name(), "native_backend_already_compiled");
        Ok(())
    }

    fn allocate(&mut self, bytes: usize) -> Result<BufferHandle> {
        self.memory.allocate(bytes)
    }

    fn release(&mut self, handle: BufferHandle) -> Result<()> {
        self.memory.release(handle)
    }

    fn release_all(&mut self) -> usize {
        self.memory.release_all()
    }

    fn write_rect(
        &mut self,
        dst: BufferHandle,
        host: &[u8],
        host_origin: RectOrigin,
        host_pitch: RectPitch,
        device_pitch: RectPitch,
        region: CopyRegion,
    ) -> Result<()> {
        self.memory
            .write_rect(dst, host, host_origin, host_pitch, device_pitch, region)
    }

    fn read_rect(
        &self,
        src: BufferHandle,
        host: &mut [u8],
        host_origin: RectOrigin,
        host_pitch: RectPitch,
        device_pitch: RectPitch,
        region: CopyRegion,
    ) -> Result<()> {
        self.memory
            .read_rect(src, host, host_origin, host_pitch, device_pitch, region)
    }

    fn set_arg(&mut self, index: usize, arg: KernelArg) -> Result<()> {
        if index >= self.args.len() {
            self.args.resize(index + 1, None);
        }
        self.args[index] = Some(arg);
        Ok(())
    }

    fn enqueue(&mut self, global_size: usize, local_size: usize) -> Result<()> {
        let groups = validate_launch(global_size, local_size)?;
        let params = marshal_args(&self.args, &self.memory)?;
        launch_groups(&self.pool, self.program.entry(), &params, groups, local_size)
    }

    fn synchronize(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;
    use kinflux_kernel_abi::CKernelLaunch;

    unsafe extern "C" fn nop_entry(
        _launch: *const CKernelLaunch,
        _params: *const u8,
        _params_len: usize,
    ) -> i32 {
        0
    }

    #[test]
    fn native_backend_is_ready_at_construction() {
        registry::register_kernel("native_test_nop", nop_entry);
        let backend =
            NativeBackend::new(1, &ProgramSource::Registered("native_test_nop".into())).unwrap();
        assert!(backend.is_ready());
        assert_eq!(backend.compute_units(), 1);
    }

    #[test]
    fn oversubscribed_work_size_is_rejected() {
        registry::register_kernel("native_test_nop2", nop_entry);
        let err = NativeBackend::new(
            100_000,
            &ProgramSource::Registered("native_test_nop2".into()),
        )
        .unwrap_err();
        assert!(matches!(err, BackendError::TooManyUnitsRequested { .. }));
    }

    #[test]
    fn unknown_kernel_fails_at_construction() {
        let err = NativeBackend::new(1, &ProgramSource::Registered("native_test_absent".into()));
        assert!(matches!(err, Err(BackendError::BuildFailure { .. })));
    }
}
