//! Command-queue offload backend.
//!
//! Models a queue-driven accelerator in-process: device memory is reachable
//! only through the rect transfer calls, the program is loaded from a binary
//! (or the registry), and a launch executes its work groups in parallel on a
//! worker pool partitioned to the selected device's compute units.
//!
//! The queue executes eagerly: `enqueue` has completed the launch by the time
//! it returns, and `synchronize` is the ordering point the public contract
//! promises. Callers must not assume results are visible before
//! `synchronize` returns.

use crate::arena::BufferArena;
use crate::backend::{Backend, BufferHandle, KernelArg};
use crate::device::{select_device, DeviceQuery, SelectedDevice};
use crate::error::{BackendError, Result};
use crate::exec::{launch_groups, marshal_args, validate_launch};
use crate::program::{Program, ProgramSource};
use crate::strided::{CopyRegion, RectOrigin, RectPitch};

/// Offload backend driving the in-process command-queue device.
#[derive(Debug)]
pub struct QueueBackend {
    device: SelectedDevice,
    build_options: String,
    pool: rayon::ThreadPool,
    memory: BufferArena,
    program: Option<Program>,
    args: Vec<Option<KernelArg>>,
}

impl QueueBackend {
    /// Select a device per `query` and create its command queue.
    pub fn new(query: &DeviceQuery) -> Result<Self> {
        Self::with_build_options(query, "")
    }

    /// As [`QueueBackend::new`], with explicit program build options
    /// (recorded and logged at load; the in-process loader takes no flags).
    pub fn with_build_options(query: &DeviceQuery, build_options: &str) -> Result<Self> {
        let device = select_device(query)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(device.compute_units)
            .thread_name(|i| format!("kinflux-queue-{i}"))
            .build()
            .map_err(|err| BackendError::QueueCreation(err.to_string()))?;

        tracing::debug!(
            device = %device.info.name,
            compute_units = device.compute_units,
            "command_queue_created"
        );

        Ok(Self {
            device,
            build_options: build_options.to_string(),
            pool,
            memory: BufferArena::new(),
            program: None,
            args: Vec::new(),
        })
    }

    pub fn device(&self) -> &SelectedDevice {
        &self.device
    }
}

impl Backend for QueueBackend {
    fn descriptor(&self) -> String {
        format!(
            "{} [{} units]",
            self.device.info.name, self.device.compute_units
        )
    }

    fn compute_units(&self) -> usize {
        self.device.compute_units
    }

    fn is_ready(&self) -> bool {
        self.program.is_some()
    }

    fn load_program(&mut self, source: &ProgramSource) -> Result<()> {
        let program = Program::load(source)?;
        tracing::info!(
            kernel = program.name(),
            build_options = %self.build_options,
            device = %self.device.info.name,
            "program_loaded_on_queue"
        );
        self.program = Some(program);
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
        let program = self.program.as_ref().ok_or(BackendError::ProgramNotLoaded)?;
        let groups = validate_launch(global_size, local_size)?;
        let params = marshal_args(&self.args, &self.memory)?;
        launch_groups(&self.pool, program.entry(), &params, groups, local_size)
    }

    fn synchronize(&mut self) -> Result<()> {
        // enqueue executed the launch eagerly; nothing is in flight here
        Ok(())
    }
}
